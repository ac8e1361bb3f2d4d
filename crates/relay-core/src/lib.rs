//! Relay core: settings, tools, model providers and the agent loop

pub mod agent;
pub mod config;
pub mod doctor;
pub mod fallback;
pub mod providers;
pub mod tools;

pub use agent::{AgentTurn, Fallback, LlmAgent, ToolCallRecord, ToolResponseRecord, ToolTrace};
pub use config::{AgentEndpoint, AgentKind, ConfigError, Settings};
pub use tools::{ToolDefinition, ToolExecutor, ToolHandler, ToolRegistry};
