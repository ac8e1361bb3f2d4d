//! Lazily-connected MCP client slot with connect retries

use anyhow::{Result, anyhow};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{McpClient, McpClientConfig};
use crate::protocol::McpTool;

/// Owns at most one live [`McpClient`]. The first call connects; a transport
/// failure drops the client so the next call reconnects.
pub struct McpConnection {
    config: McpClientConfig,
    retry_attempts: u32,
    backoff: Duration,
    slot: Mutex<Option<Arc<McpClient>>>,
}

impl McpConnection {
    pub fn new(config: McpClientConfig, retry_attempts: u32) -> Self {
        Self {
            config,
            retry_attempts: retry_attempts.max(1),
            backoff: Duration::from_secs(1),
            slot: Mutex::new(None),
        }
    }

    /// Base delay between connect attempts; attempt `n` waits `n * backoff`
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.is_closed())
    }

    async fn client(&self) -> Result<Arc<McpClient>> {
        let mut slot = self.slot.lock().await;
        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            warn!("MCP connection to {} was lost, reconnecting", self.config.name);
            *slot = None;
        }

        let mut last_error = None;
        for attempt in 1..=self.retry_attempts {
            match McpClient::connect(self.config.clone()).await {
                Ok(client) => {
                    *slot = Some(client.clone());
                    return Ok(client);
                }
                Err(e) => {
                    warn!(
                        "MCP connect to {} failed (attempt {}/{}): {:#}",
                        self.config.name, attempt, self.retry_attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("No connect attempts made"))
            .context(format!(
                "Could not connect to MCP server {} after {} attempts",
                self.config.name, self.retry_attempts
            )))
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let client = self.client().await?;
        let result = client.list_tools().await;
        self.drop_if_closed(&client).await;
        result
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let client = self.client().await?;
        let result = client.call_tool(name, arguments).await;
        self.drop_if_closed(&client).await;
        result
    }

    async fn drop_if_closed(&self, client: &Arc<McpClient>) {
        if !client.is_closed() {
            return;
        }
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, client)) {
            *slot = None;
            client.shutdown().await;
        }
    }

    /// Stop the server process if one is running
    pub async fn shutdown(&self) {
        if let Some(client) = self.slot.lock().await.take() {
            client.shutdown().await;
            info!("MCP connection {} shut down", self.config.name);
        }
    }
}
