//! A2A server: serves an agent card and runs delegated tasks
//!
//! Tasks live in an in-memory table. A submission with `wait` blocks until
//! the task finishes; without it the caller polls `GET /a2a/tasks/{id}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::Utc;
use relay_core::config::AGENT_CARD_PATH;
use relay_core::{AgentTurn, ToolTrace};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::protocol::*;

/// Finished tasks are kept this long for status polling
const FINISHED_TASK_TTL_SECS: i64 = 3600;

/// Runs the work behind a task
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, prompt: &str, context: &Value) -> Result<AgentTurn>;

    /// Prompt used when a submission arrives with an empty one
    fn default_prompt(&self) -> &str {
        "Hello"
    }
}

struct TaskEntry {
    task: TaskResponse,
    abort: Option<AbortHandle>,
}

/// A2A endpoint for one agent
pub struct A2aServer {
    card: AgentCard,
    executor: Arc<dyn TaskExecutor>,
    tasks: RwLock<HashMap<String, TaskEntry>>,
    task_timeout: Duration,
}

type SharedServer = Arc<A2aServer>;

impl A2aServer {
    pub fn new(card: AgentCard, executor: Arc<dyn TaskExecutor>, task_timeout: Duration) -> Self {
        Self {
            card,
            executor,
            tasks: RwLock::new(HashMap::new()),
            task_timeout,
        }
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Snapshot of a task, if known
    pub async fn task(&self, task_id: &str) -> Option<TaskResponse> {
        self.tasks.read().await.get(task_id).map(|e| e.task.clone())
    }

    async fn finish(&self, task_id: &str, status: TaskStatus, result: String, trace: ToolTrace) {
        let mut tasks = self.tasks.write().await;
        let Some(entry) = tasks.get_mut(task_id) else {
            return;
        };
        // A cancellation that raced the executor wins
        if entry.task.status.is_terminal() {
            return;
        }
        entry.task.status = status;
        entry.task.result = Some(result);
        entry.task.trace = trace;
        entry.task.completed_at = Some(Utc::now());
        entry.abort = None;
    }

    async fn set_working(&self, task_id: &str) {
        if let Some(entry) = self.tasks.write().await.get_mut(task_id)
            && entry.task.status == TaskStatus::Submitted
        {
            entry.task.status = TaskStatus::Working;
        }
    }

    async fn run_task(self: Arc<Self>, task_id: String, prompt: String, context: Value) {
        self.set_working(&task_id).await;

        let outcome =
            tokio::time::timeout(self.task_timeout, self.executor.execute(&prompt, &context)).await;

        match outcome {
            Ok(Ok(turn)) => {
                info!(
                    "Task {} completed ({} tool calls{})",
                    task_id,
                    turn.trace.tool_calls.len(),
                    if turn.used_fallback { ", fallback" } else { "" }
                );
                self.finish(&task_id, TaskStatus::Completed, turn.text, turn.trace)
                    .await;
            }
            Ok(Err(e)) => {
                warn!("Task {} failed: {:#}", task_id, e);
                self.finish(
                    &task_id,
                    TaskStatus::Failed,
                    format!("Error: {:#}", e),
                    ToolTrace::default(),
                )
                .await;
            }
            Err(_) => {
                warn!("Task {} timed out after {:?}", task_id, self.task_timeout);
                self.finish(
                    &task_id,
                    TaskStatus::Failed,
                    format!("Error: task timed out after {}s", self.task_timeout.as_secs()),
                    ToolTrace::default(),
                )
                .await;
            }
        }
    }

    async fn prune_finished(&self) {
        let cutoff = Utc::now() - chrono::TimeDelta::seconds(FINISHED_TASK_TTL_SECS);
        self.tasks.write().await.retain(|_, entry| {
            entry
                .task
                .completed_at
                .is_none_or(|completed| completed > cutoff)
        });
    }
}

/// Build the agent's HTTP router
pub fn router(server: SharedServer) -> Router {
    Router::new()
        .route(AGENT_CARD_PATH, get(agent_card_handler))
        .route("/health", get(health_handler))
        .route("/a2a/tasks", post(submit_task_handler))
        .route(
            "/a2a/tasks/{id}",
            get(get_task_handler).delete(cancel_task_handler),
        )
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(server)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(server: SharedServer, addr: &str) -> Result<()> {
    let name = server.card.name.clone();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} to {}", name, addr))?;

    info!("{} listening on http://{}", name, addr);
    axum::serve(listener, router(server))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("A2A server error")?;

    info!("{} stopped", name);
    Ok(())
}

async fn agent_card_handler(State(server): State<SharedServer>) -> Json<AgentCard> {
    Json(server.card.clone())
}

async fn health_handler(State(server): State<SharedServer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        agent: server.card.name.clone(),
    })
}

async fn submit_task_handler(
    State(server): State<SharedServer>,
    Json(request): Json<TaskRequest>,
) -> (StatusCode, Json<TaskResponse>) {
    server.prune_finished().await;

    let prompt = if request.prompt.trim().is_empty() {
        server.executor.default_prompt().to_string()
    } else {
        request.prompt
    };

    let task_id = uuid::Uuid::new_v4().to_string();
    let task = TaskResponse {
        task_id: task_id.clone(),
        status: TaskStatus::Submitted,
        result: None,
        trace: ToolTrace::default(),
        created_at: Utc::now(),
        completed_at: None,
    };
    server.tasks.write().await.insert(
        task_id.clone(),
        TaskEntry {
            task: task.clone(),
            abort: None,
        },
    );

    info!("Task {} submitted to {}", task_id, server.card.name);
    let handle = tokio::spawn(server.clone().run_task(
        task_id.clone(),
        prompt,
        request.context,
    ));
    if let Some(entry) = server.tasks.write().await.get_mut(&task_id)
        && !entry.task.status.is_terminal()
    {
        entry.abort = Some(handle.abort_handle());
    }

    if !request.wait {
        return (StatusCode::ACCEPTED, Json(task));
    }

    // A cancelled task surfaces as a join error; the table already has its final state
    let _ = handle.await;
    let task = server.task(&task_id).await.unwrap_or(task);
    (StatusCode::OK, Json(task))
}

async fn get_task_handler(
    State(server): State<SharedServer>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    server
        .task(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn cancel_task_handler(
    State(server): State<SharedServer>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut tasks = server.tasks.write().await;
    let entry = tasks.get_mut(&id).ok_or_else(|| not_found(&id))?;

    if entry.task.status.is_terminal() {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Task '{}' already {}", id, entry.task.status),
            }),
        ));
    }

    if let Some(abort) = entry.abort.take() {
        abort.abort();
    }
    entry.task.status = TaskStatus::Cancelled;
    entry.task.completed_at = Some(Utc::now());
    info!("Task {} cancelled", id);
    Ok(Json(entry.task.clone()))
}

fn not_found(id: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Task '{}' not found", id),
        }),
    )
}
