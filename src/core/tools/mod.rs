//! Tools: descriptors, the typed [`Tool`](tool::Tool) trait, failure isolation
//! through [`SafeTool`](safe::SafeTool), and the staged [`ToolRegistry`](registry::ToolRegistry).

pub mod descriptor;
pub mod registry;
pub mod result;
pub mod safe;
pub mod tool;
