//! MCP (Model Context Protocol) stdio client for Relay workers

pub mod client;
pub mod connection;
pub mod protocol;

pub use client::{McpClient, McpClientConfig};
pub use connection::McpConnection;
pub use protocol::McpTool;
