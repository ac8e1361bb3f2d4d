//! A2A client: sends tasks to peer agents

use anyhow::{Context, Result, anyhow, bail};
use relay_core::config::AGENT_CARD_PATH;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::protocol::*;

/// Per-probe timeout while waiting for an agent to come up
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A2A client for communicating with peer agents
#[derive(Clone)]
pub struct A2aClient {
    http: Client,
}

impl A2aClient {
    /// `timeout` bounds every request, including a blocking task submission
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build A2A HTTP client")?;
        Ok(Self { http })
    }

    /// Fetch an agent's capability card
    pub async fn fetch_agent_card(&self, base_url: &str) -> Result<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        debug!("Fetching agent card from {}", url);
        fetch_card(self.http.get(&url), &url).await
    }

    /// Submit a task. With `wait` the peer answers once the task has finished.
    pub async fn submit_task(
        &self,
        base_url: &str,
        prompt: &str,
        context: Value,
        wait: bool,
    ) -> Result<TaskResponse> {
        let url = format!("{}/a2a/tasks", base_url.trim_end_matches('/'));
        debug!("Submitting task to {}", url);

        let request = TaskRequest {
            prompt: prompt.to_string(),
            context,
            wait,
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to submit task to {}", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Task submission failed: HTTP {}: {}", status, body);
        }

        let task: TaskResponse = resp.json().await.context("Failed to parse task response")?;

        info!("Task {} at {} is {}", task.task_id, base_url, task.status);
        Ok(task)
    }

    /// Poll task status
    pub async fn get_task_status(&self, base_url: &str, task_id: &str) -> Result<TaskResponse> {
        let url = format!("{}/a2a/tasks/{}", base_url.trim_end_matches('/'), task_id);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to poll task {} at {}", task_id, url))?;

        if !resp.status().is_success() {
            bail!("Task status request failed: HTTP {}", resp.status());
        }

        resp.json().await.context("Failed to parse task status")
    }

    /// Cancel a running task
    pub async fn cancel_task(&self, base_url: &str, task_id: &str) -> Result<TaskResponse> {
        let url = format!("{}/a2a/tasks/{}", base_url.trim_end_matches('/'), task_id);

        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("Failed to cancel task {} at {}", task_id, url))?;

        if !resp.status().is_success() {
            bail!("Task cancellation failed: HTTP {}", resp.status());
        }

        info!("Task {} cancelled", task_id);
        resp.json().await.context("Failed to parse task status")
    }

    /// Submit without waiting, then poll until the task reaches a terminal state
    pub async fn submit_and_wait(
        &self,
        base_url: &str,
        prompt: &str,
        context: Value,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TaskResponse> {
        let task = self.submit_task(base_url, prompt, context, false).await?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() > deadline {
                return Err(anyhow!(
                    "Task {} timed out after {:?}",
                    task.task_id,
                    timeout
                ));
            }

            tokio::time::sleep(poll_interval).await;

            let status = self.get_task_status(base_url, &task.task_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
        }
    }

    /// Poll the agent card until it answers or `timeout` elapses
    pub async fn wait_until_ready(&self, base_url: &str, timeout: Duration) -> Result<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let probe = self.http.get(&url).timeout(READY_PROBE_TIMEOUT);
            match fetch_card(probe, &url).await {
                Ok(card) => return Ok(card),
                Err(e) => debug!("{} not ready yet: {:#}", url, e),
            }
            if tokio::time::Instant::now() + READY_POLL_INTERVAL > deadline {
                bail!("Agent at {} not ready after {:?}", base_url, timeout);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

async fn fetch_card(req: reqwest::RequestBuilder, url: &str) -> Result<AgentCard> {
    let resp = req
        .send()
        .await
        .with_context(|| format!("Failed to connect to agent at {}", url))?;

    if !resp.status().is_success() {
        bail!("Agent card request failed: HTTP {}", resp.status());
    }

    let card: AgentCard = resp.json().await.context("Failed to parse agent card")?;
    debug!("Fetched agent card: {} ({} skills)", card.name, card.skills.len());
    Ok(card)
}

/// Whether the request never reached the peer (nothing listening)
pub fn is_connection_refused(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<reqwest::Error>())
        .any(|e| e.is_connect())
}

/// Whether the request gave up waiting for the peer
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<reqwest::Error>())
        .any(|e| e.is_timeout())
}
