pub mod executor;
pub mod registry;
pub mod schema;

pub use executor::{FunctionExecutor, FunctionOutcome, ToolExecutor};
pub use registry::{Tool, ToolRegistry};
pub use schema::{function_arguments_description, function_name_description, simulated_call_schema_json};
