//! Chat sessions: each browser conversation keeps its own transcript

use chrono::{DateTime, Utc};
use relay_core::ToolTrace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Maximum session ID length
const MAX_SESSION_ID_LEN: usize = 128;

/// Maximum number of sessions kept; the least recently active is evicted
const MAX_SESSIONS: usize = 1000;

/// Prior messages forwarded to the host agent with each request
pub const HISTORY_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One message of a transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "ToolTrace::is_empty")]
    pub trace: ToolTrace,
}

/// A single chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<ChatEntry>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
        }
    }

    /// The last `limit` messages as `[{role, content}]`
    pub fn recent_history(&self, limit: usize) -> Value {
        let start = self.messages.len().saturating_sub(limit);
        Value::Array(
            self.messages[start..]
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
                .collect(),
        )
    }
}

/// Normalize a session key: lowercase, trim whitespace, reject path-like input
fn normalize_session_key(key: &str) -> Result<String, &'static str> {
    let normalized = key.trim().to_lowercase();

    if normalized.is_empty() {
        return Err("Session ID cannot be empty");
    }
    if normalized.len() > MAX_SESSION_ID_LEN {
        return Err("Session ID too long");
    }
    if normalized.contains('/') || normalized.contains('\\') || normalized.contains("..") {
        return Err("Session ID contains invalid characters");
    }
    if normalized.chars().any(|c| c.is_control()) {
        return Err("Session ID contains control characters");
    }

    Ok(normalized)
}

/// Manages all active sessions
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty session
    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.write().await;
        evict_if_full(&mut sessions);
        sessions.insert(session.id.clone(), session.clone());
        info!("Created session {}", session.id);
        session
    }

    /// Get a session by ID (with key normalization)
    pub async fn get(&self, id: &str) -> Option<Session> {
        let normalized = normalize_session_key(id).ok()?;
        self.sessions.read().await.get(&normalized).cloned()
    }

    /// The named session, or a new one when `id` is absent or unknown
    pub async fn get_or_create(&self, id: Option<&str>) -> Result<Session, &'static str> {
        let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
            return Ok(self.create().await);
        };
        let normalized = normalize_session_key(id)?;
        if let Some(session) = self.sessions.read().await.get(&normalized) {
            return Ok(session.clone());
        }
        debug!("Session {} not found, starting a new one", normalized);
        Ok(self.create().await)
    }

    /// Append one exchange to a session's transcript
    pub async fn record_exchange(&self, id: &str, user: &str, reply: &str, trace: ToolTrace) {
        let Ok(normalized) = normalize_session_key(id) else {
            return;
        };
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&normalized) {
            let now = Utc::now();
            session.messages.push(ChatEntry {
                role: Speaker::User,
                content: user.to_string(),
                timestamp: now,
                trace: ToolTrace::default(),
            });
            session.messages.push(ChatEntry {
                role: Speaker::Assistant,
                content: reply.to_string(),
                timestamp: now,
                trace,
            });
            session.last_activity = now;
            debug!(
                "Session {} now has {} messages",
                normalized,
                session.messages.len()
            );
        }
    }

    /// Number of active sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn evict_if_full(sessions: &mut HashMap<String, Session>) {
    if sessions.len() < MAX_SESSIONS {
        return;
    }
    if let Some(oldest) = sessions
        .values()
        .min_by_key(|s| s.last_activity)
        .map(|s| s.id.clone())
    {
        sessions.remove(&oldest);
        info!("Evicted idle session {}", oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::agent::ToolCallRecord;

    #[tokio::test]
    async fn test_create_and_get() {
        let mgr = SessionManager::new();
        let session = mgr.create().await;
        assert!(session.messages.is_empty());
        assert_eq!(mgr.count().await, 1);

        let found = mgr.get(&session.id.to_uppercase()).await.unwrap();
        assert_eq!(found.id, session.id);
        assert!(mgr.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_create() {
        let mgr = SessionManager::new();
        let first = mgr.get_or_create(None).await.unwrap();
        let again = mgr.get_or_create(Some(&first.id)).await.unwrap();
        assert_eq!(first.id, again.id);

        let fresh = mgr.get_or_create(Some("gone")).await.unwrap();
        assert_ne!(fresh.id, "gone");
        assert_eq!(mgr.count().await, 2);

        assert!(mgr.get_or_create(Some("../etc/passwd")).await.is_err());
    }

    #[tokio::test]
    async fn test_record_exchange_and_history() {
        let mgr = SessionManager::new();
        let session = mgr.create().await;
        let trace = ToolTrace {
            tool_calls: vec![ToolCallRecord {
                name: "delegate_task".to_string(),
                args: serde_json::json!({"agent_name": "notion_agent"}),
            }],
            tool_responses: vec![],
        };
        mgr.record_exchange(&session.id, "find notes", "Found 3 pages", trace)
            .await;

        let session = mgr.get(&session.id).await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Speaker::User);
        assert_eq!(session.messages[1].trace.tool_calls.len(), 1);

        let history = session.recent_history(HISTORY_MESSAGES);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["content"], "Found 3 pages");
    }

    #[tokio::test]
    async fn test_recent_history_keeps_tail() {
        let mgr = SessionManager::new();
        let session = mgr.create().await;
        for i in 0..4 {
            mgr.record_exchange(&session.id, &format!("q{i}"), &format!("a{i}"), ToolTrace::default())
                .await;
        }
        let history = mgr.get(&session.id).await.unwrap().recent_history(3);
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0]["content"], "a2");
        assert_eq!(history[2]["content"], "a3");
    }

    #[test]
    fn test_normalize_session_key() {
        assert_eq!(normalize_session_key("  ABC  ").unwrap(), "abc");
        assert!(normalize_session_key("../etc/passwd").is_err());
        assert!(normalize_session_key("foo\\bar").is_err());
        assert!(normalize_session_key("foo\0bar").is_err());
        assert!(normalize_session_key("   ").is_err());
        assert!(normalize_session_key(&"a".repeat(MAX_SESSION_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut sessions = HashMap::new();
        let mut oldest_id = String::new();
        for i in 0..MAX_SESSIONS {
            let mut s = Session::new();
            s.last_activity = Utc::now() + chrono::TimeDelta::seconds(i as i64);
            if i == 0 {
                oldest_id = s.id.clone();
            }
            sessions.insert(s.id.clone(), s);
        }
        evict_if_full(&mut sessions);
        assert_eq!(sessions.len(), MAX_SESSIONS - 1);
        assert!(!sessions.contains_key(&oldest_id));
    }
}
