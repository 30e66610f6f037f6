// Core types shared by the agentkit tool server and agent client

pub mod agents;
pub mod error;
pub mod output;
pub mod permission;
pub mod schema;

pub use agents::{SubagentDefinition, SubagentModel, SubagentRegistry};
pub use error::{AgentError, AgentResult, ErrorKind};
pub use output::{OutputFormat, OutputValidator};
pub use permission::{
    PermissionDecision, PermissionGate, PermissionHandler, PermissionMode, PermissionPolicy,
    PermissionRequest,
};
pub use schema::{ArgValue, Arguments, ParamSpec, ParamType, ParameterSchema};
