//! Strategy graphs: typed nodes, guarded edges and the loop that walks them.

pub mod edge;
pub mod executor;
pub mod node;
pub mod nodes;
pub mod strategies;
pub mod strategy;

pub use edge::Edge;
pub use node::{NodeFuture, NodeLogic, StrategyNode};
pub use strategies::{ToolCallMode, single_run_strategy};
pub use strategy::{FINISH, START, Strategy, StrategyBuilder};
