mod registry;
mod tool;

pub use registry::{RegistryError, ToolRegistry};
pub use tool::{default_input_schema, Result, Tool, ToolError};
