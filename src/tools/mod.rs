//! Tool system: schemas, registry, argument handling and execution.

pub mod arguments;
pub mod builtin;
pub mod command;
pub mod executor;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use command::ToolCommand;
pub use executor::ToolExecutor;
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::{ToolDefinition, ToolParameters};
