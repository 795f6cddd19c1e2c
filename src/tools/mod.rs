//! 工具层：能力接口、参数 Schema、注册表与带超时的执行器

pub mod echo;
pub mod executor;
pub mod outcome;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use outcome::ToolOutcome;
pub use registry::{catalogue_json, Tool, ToolDescriptor, ToolRegistry};
pub use schema::{action_schema_json, ParamKind, ParamSpec, ToolSchema};
