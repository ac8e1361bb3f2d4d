//! Remote tool servers the worker tools forward to

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use relay_mcp::McpConnection;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Something that can run a named remote tool
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;

    /// Release the server, if it holds a process
    async fn shutdown(&self) {}
}

#[async_trait]
impl ToolServer for McpConnection {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        McpConnection::call_tool(self, name, arguments).await
    }

    async fn shutdown(&self) {
        McpConnection::shutdown(self).await
    }
}

/// A tool server whose calls give up after a fixed time, whatever the
/// server's own connect and request limits are
pub struct TimeBoxed<S> {
    inner: S,
    limit: Duration,
}

impl<S: ToolServer> TimeBoxed<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<S: ToolServer> ToolServer for TimeBoxed<S> {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        match tokio::time::timeout(self.limit, self.inner.call_tool(name, arguments)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Remote tool {} gave no answer within {:?}", name, self.limit);
                Err(anyhow!(
                    "remote tool '{}' gave no answer within {:?}",
                    name,
                    self.limit
                ))
            }
        }
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and answers with a fixed reply, or fails when `reply` is `None`
    pub(crate) struct StubServer {
        pub reply: Option<String>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl StubServer {
        pub(crate) fn answering(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolServer for StubServer {
        async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => anyhow::bail!("MCP server exited"),
            }
        }
    }

    /// Never answers
    pub(crate) struct SilentServer;

    #[async_trait]
    impl ToolServer for SilentServer {
        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_time_boxed_passes_answers_through() {
        let server = TimeBoxed::new(StubServer::answering("ok"), Duration::from_secs(1));
        let out = server
            .call_tool("API-post-search", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }

    #[tokio::test]
    async fn test_time_boxed_gives_up_on_silent_server() {
        let server = TimeBoxed::new(SilentServer, Duration::from_millis(50));
        let started = std::time::Instant::now();
        let err = server
            .call_tool("text_to_speech", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("text_to_speech"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
