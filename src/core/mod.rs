pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod feature;
pub mod graph;
pub mod memory;
pub mod prompt;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod validation;
pub mod value;
