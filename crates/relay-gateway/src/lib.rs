//! Browser chat front end for the Relay host agent
//!
//! Serves an embedded single-page UI and a small JSON API. Every chat
//! message becomes one A2A task on the host agent.

pub mod api;
pub mod frontend;
pub mod session;

use anyhow::{Context, Result};
use axum::{Router, extract::State, response::Json, routing::get};
use relay_a2a::A2aClient;
use relay_core::{AgentKind, Settings};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

use session::SessionManager;

/// Timeout of one agent card probe on the status panel
const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared application state for the chat UI
pub struct GatewayState {
    pub settings: Settings,
    pub sessions: SessionManager,
    client: A2aClient,
    probe: A2aClient,
}

impl GatewayState {
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(Self {
            client: A2aClient::new(settings.client_timeout(AgentKind::Host))?,
            probe: A2aClient::new(STATUS_PROBE_TIMEOUT)?,
            sessions: SessionManager::new(),
            settings,
        })
    }
}

/// Build the UI router: page, assets, API and health
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(frontend::frontend_router())
        .merge(api::api_router())
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat_ui",
        "sessions": state.sessions.count().await,
    }))
}

/// Bind `addr` and serve the UI until Ctrl+C
pub async fn serve(settings: Settings, addr: &str) -> Result<()> {
    let state = Arc::new(GatewayState::new(settings)?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind chat UI to {}", addr))?;

    info!("Chat UI listening on http://{}", addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Chat UI server error")?;
    Ok(())
}
