//! A2A (Agent-to-Agent) protocol for Relay
//!
//! Every agent serves an agent card and a small task API. The orchestrator
//! reaches workers through [`DelegateTaskTool`].

pub mod client;
pub mod directory;
pub mod protocol;
pub mod server;
pub mod tool;

pub use client::A2aClient;
pub use directory::PeerDirectory;
pub use protocol::{AgentCapabilities, AgentCard, AgentSkill, TaskRequest, TaskResponse, TaskStatus};
pub use server::{A2aServer, TaskExecutor};
pub use tool::DelegateTaskTool;
