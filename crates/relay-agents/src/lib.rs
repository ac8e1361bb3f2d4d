//! Agent definitions for Relay
//!
//! Two workers (Notion search, ElevenLabs speech) that forward to MCP
//! servers, and a host agent that routes requests to them over A2A.

pub mod backend;
pub mod elevenlabs;
pub mod host;
pub mod notion;
pub mod service;

use relay_core::providers::{GeminiProvider, LlmProvider};
use relay_core::Settings;
use std::sync::Arc;
use tracing::warn;

pub use backend::ToolServer;
pub use service::{AgentService, AgentSummary};

/// Gemini provider from settings; `None` without a usable API key
pub fn provider(settings: &Settings) -> Option<Arc<dyn LlmProvider>> {
    if settings.google_api_key.is_empty() {
        return None;
    }
    match GeminiProvider::new(&settings.google_api_key, &settings.model) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!("Gemini provider unavailable: {:#}", e);
            None
        }
    }
}
