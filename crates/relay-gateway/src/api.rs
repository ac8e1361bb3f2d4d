//! JSON API behind the chat page

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use futures_util::future::join_all;
use relay_a2a::TaskStatus;
use relay_a2a::client::is_connection_refused;
use relay_core::agent::{ToolCallRecord, ToolResponseRecord};
use relay_core::{AgentKind, ToolTrace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::GatewayState;
use crate::session::{ChatEntry, HISTORY_MESSAGES};

type SharedState = Arc<GatewayState>;
type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub success: bool,
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub tool_responses: Vec<ToolResponseRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentStatus {
    pub name: String,
    pub display_name: String,
    pub url: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub title: String,
    pub config_issues: Vec<String>,
    pub agents: Vec<AgentStatus>,
}

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/{id}/history", get(history_handler))
        .route("/api/status", get(status_handler))
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("Message cannot be empty"));
    }

    let session = state
        .sessions
        .get_or_create(request.session_id.as_deref())
        .await
        .map_err(bad_request)?;
    let context = serde_json::json!({ "history": session.recent_history(HISTORY_MESSAGES) });
    let host = state.settings.endpoint(AgentKind::Host);

    let (success, reply, trace) = match state
        .client
        .submit_task(&host.url, message, context, true)
        .await
    {
        Ok(task) if task.status == TaskStatus::Completed => (
            true,
            task.result.unwrap_or_else(|| "(no response)".to_string()),
            task.trace,
        ),
        Ok(task) => (
            false,
            format!(
                "I encountered an error: {}",
                task.result
                    .unwrap_or_else(|| format!("the task was {}", task.status))
            ),
            task.trace,
        ),
        Err(e) if is_connection_refused(&e) => {
            warn!("Host agent is not running at {}", host.url);
            (
                false,
                format!(
                    "I encountered an error: the host agent is not running at {}. \
                     Start it with `relay start`.",
                    host.url
                ),
                ToolTrace::default(),
            )
        }
        Err(e) => {
            warn!("Chat request failed: {:#}", e);
            (
                false,
                format!("I encountered an error: {:#}", e),
                ToolTrace::default(),
            )
        }
    };

    info!(
        session = %session.id,
        success,
        tool_calls = trace.tool_calls.len(),
        "Chat exchange"
    );
    state
        .sessions
        .record_exchange(&session.id, message, &reply, trace.clone())
        .await;

    Ok(Json(ChatResponse {
        session_id: session.id,
        success,
        reply,
        tool_calls: trace.tool_calls,
        tool_responses: trace.tool_responses,
    }))
}

async fn create_session_handler(
    State(state): State<SharedState>,
) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id,
        }),
    )
}

async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state.sessions.get(&id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("Session '{}' not found", id),
            }),
        )
    })?;
    Ok(Json(HistoryResponse {
        session_id: session.id,
        messages: session.messages,
    }))
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let probes = state.settings.endpoints().into_iter().map(|endpoint| {
        let probe = state.probe.clone();
        async move {
            let card = probe.fetch_agent_card(&endpoint.url).await.ok();
            AgentStatus {
                display_name: endpoint.kind.display_name().to_string(),
                online: card.is_some(),
                description: card.map(|c| c.description),
                name: endpoint.name,
                url: endpoint.url,
            }
        }
    });

    Json(StatusResponse {
        title: state.settings.ui_title.clone(),
        config_issues: state.settings.validate(),
        agents: join_all(probes).await,
    })
}
