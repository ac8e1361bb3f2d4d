//! `delegate_task` tool: hands a task to a worker agent over A2A

use anyhow::Result;
use async_trait::async_trait;
use relay_core::fallback;
use relay_core::tools::{ToolHandler, json_schema, required_str};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::client::{A2aClient, is_connection_refused, is_timeout};
use crate::directory::PeerDirectory;
use crate::protocol::TaskStatus;

/// Tool that delegates a task to a peer agent and returns its answer
pub struct DelegateTaskTool {
    client: A2aClient,
    peers: PeerDirectory,
    timeout: Duration,
}

impl DelegateTaskTool {
    /// `timeout` bounds one delegation round trip
    pub fn new(peers: PeerDirectory, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: A2aClient::new(timeout)?,
            peers,
            timeout,
        })
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }

    /// Send `task` to `agent_name` and return the text the orchestrator sees
    pub async fn delegate(&self, agent_name: &str, task: &str) -> Result<String> {
        let peer = self.peers.resolve(agent_name)?;
        let started = Instant::now();

        let response = match self
            .client
            .submit_task(&peer.url, task, serde_json::json!({}), true)
            .await
        {
            Ok(done) => match done.status {
                TaskStatus::Completed => done
                    .result
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "(no response)".to_string()),
                status => format!(
                    "Error from {}: task {}{}",
                    peer.name,
                    status,
                    done.result.map(|r| format!(": {r}")).unwrap_or_default()
                ),
            },
            Err(e) if is_connection_refused(&e) => {
                warn!("{} is not running at {}", peer.name, peer.url);
                fallback::agent_unavailable(&peer.name, task, fallback::now_timestamp())
            }
            Err(e) if is_timeout(&e) => {
                warn!("Delegation to {} timed out", peer.name);
                format!(
                    "Error from {}: no answer within {}s",
                    peer.name,
                    self.timeout.as_secs()
                )
            }
            Err(e) => {
                warn!("Delegation to {} failed: {:#}", peer.name, e);
                format!("Error from {}: {:#}", peer.name, e)
            }
        };

        info!(
            target_agent = %peer.name,
            request = %fallback::preview(task),
            response = %fallback::preview(&response),
            latency_ms = started.elapsed().as_millis() as u64,
            "delegation"
        );
        Ok(response)
    }
}

#[async_trait]
impl ToolHandler for DelegateTaskTool {
    fn name(&self) -> &str {
        "delegate_task"
    }

    fn description(&self) -> &str {
        "Delegate a task to a specialized agent via the A2A protocol and wait for its answer. \
         Use notion_agent for searching or querying the Notion workspace and \
         elevenlabs_agent for converting text to speech."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "agent_name": {
                    "type": "string",
                    "description": format!(
                        "Agent to delegate to: {}",
                        self.peers.names().join(" or ")
                    )
                },
                "task_description": {
                    "type": "string",
                    "description": "Complete description of the task for the agent"
                }
            }),
            vec!["agent_name", "task_description"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let agent_name = required_str(&input, "agent_name")?;
        let task = required_str(&input, "task_description")?;
        self.delegate(agent_name, task).await
    }
}
