//! One running agent: its card, its agent loop and its tool server

use anyhow::Result;
use async_trait::async_trait;
use relay_a2a::{AgentCapabilities, AgentCard, AgentSkill, TaskExecutor};
use relay_core::providers::ChatMessage;
use relay_core::{AgentKind, AgentTurn, LlmAgent, Settings};
use relay_mcp::{McpClientConfig, McpConnection};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::backend::{TimeBoxed, ToolServer};
use crate::{elevenlabs, host, notion};

pub const AGENT_VERSION: &str = "1.0.0";

/// Non-sensitive description of an agent, for logs and `relay config`
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub model: String,
    pub skills: Vec<String>,
    pub tools_count: usize,
}

pub struct AgentService {
    kind: AgentKind,
    agent: LlmAgent,
    card: AgentCard,
    tool_server: Option<Arc<dyn ToolServer>>,
}

impl AgentService {
    /// Build the agent of `kind` from settings. MCP servers start on first use.
    pub fn build(kind: AgentKind, settings: &Settings) -> Result<Self> {
        let config = match kind {
            AgentKind::Notion => notion::server_config(settings),
            AgentKind::ElevenLabs => elevenlabs::server_config(settings),
            AgentKind::Host => None,
        };
        Self::build_with_server(kind, settings, config)
    }

    /// Build the agent of `kind` with an explicit MCP server launch config.
    /// Each remote call is bounded by the settings' tool call timeout.
    pub fn build_with_server(
        kind: AgentKind,
        settings: &Settings,
        config: Option<McpClientConfig>,
    ) -> Result<Self> {
        let tool_server = config.map(|c| {
            Arc::new(TimeBoxed::new(
                McpConnection::new(c, settings.mcp_retry_attempts),
                settings.tool_call_timeout(),
            )) as Arc<dyn ToolServer>
        });

        let (agent, skills) = match kind {
            AgentKind::Notion => (
                notion::agent(settings, tool_server.clone()),
                notion::skills(),
            ),
            AgentKind::ElevenLabs => (
                elevenlabs::agent(settings, tool_server.clone()),
                elevenlabs::skills(),
            ),
            AgentKind::Host => (host::agent(settings)?, host::skills()),
        };

        Ok(Self::new(kind, agent, agent_card(kind, settings, skills), tool_server))
    }

    pub fn new(
        kind: AgentKind,
        agent: LlmAgent,
        card: AgentCard,
        tool_server: Option<Arc<dyn ToolServer>>,
    ) -> Self {
        Self {
            kind,
            agent,
            card,
            tool_server,
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn agent(&self) -> &LlmAgent {
        &self.agent
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.agent.name().to_string(),
            description: self.agent.description().to_string(),
            model: self.agent.model().to_string(),
            skills: self.card.skills.iter().map(|s| s.name.clone()).collect(),
            tools_count: self.agent.tools().len(),
        }
    }

    /// Stop the tool server process, if one was started
    pub async fn shutdown(&self) {
        if let Some(server) = &self.tool_server {
            server.shutdown().await;
        }
        info!("{} shut down", self.agent.name());
    }
}

#[async_trait]
impl TaskExecutor for AgentService {
    async fn execute(&self, prompt: &str, context: &Value) -> Result<AgentTurn> {
        let history = history_from_context(context);
        Ok(self.agent.run(prompt, &history).await)
    }

    fn default_prompt(&self) -> &str {
        match self.kind {
            AgentKind::Notion => notion::DEFAULT_PROMPT,
            AgentKind::ElevenLabs => elevenlabs::DEFAULT_PROMPT,
            AgentKind::Host => host::DEFAULT_PROMPT,
        }
    }
}

/// Agent card for `kind` at its configured address
pub fn agent_card(kind: AgentKind, settings: &Settings, skills: Vec<AgentSkill>) -> AgentCard {
    let endpoint = settings.endpoint(kind);
    let description = match kind {
        AgentKind::Notion => notion::DESCRIPTION,
        AgentKind::ElevenLabs => elevenlabs::DESCRIPTION,
        AgentKind::Host => host::DESCRIPTION,
    };
    AgentCard {
        name: endpoint.name,
        description: description.to_string(),
        url: format!("http://{}:{}/", endpoint.host, endpoint.port),
        version: AGENT_VERSION.to_string(),
        default_input_modes: vec!["text".to_string()],
        default_output_modes: vec!["text".to_string()],
        capabilities: AgentCapabilities::default(),
        skills,
    }
}

/// Prior turns from `context.history`: `[{role, content}]`, roles `user` and `assistant`/`model`
pub fn history_from_context(context: &Value) -> Vec<ChatMessage> {
    let Some(turns) = context.get("history").and_then(|h| h.as_array()) else {
        return Vec::new();
    };
    turns
        .iter()
        .filter_map(|turn| {
            let content = turn.get("content")?.as_str()?;
            match turn.get("role")?.as_str()? {
                "user" => Some(ChatMessage::user(content)),
                "assistant" | "model" => Some(ChatMessage::assistant(content)),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_a2a::{A2aClient, A2aServer, TaskStatus};
    use relay_core::fallback;
    use relay_core::providers::ChatRole;

    fn settings() -> Settings {
        Settings::from_lookup(|key| match key {
            "AGENT_HOST" => Some("0.0.0.0".to_string()),
            "NOTION_AGENT_PORT" => Some("9102".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_card_for_each_agent() {
        let settings = settings();
        for kind in AgentKind::ALL {
            let service = AgentService::build(kind, &settings).unwrap();
            let card = service.card();
            assert_eq!(card.name, kind.agent_name());
            assert_eq!(card.version, "1.0.0");
            assert!(!card.capabilities.streaming);
            assert!(!card.skills.is_empty());
        }
        let notion = AgentService::build(AgentKind::Notion, &settings).unwrap();
        assert_eq!(notion.card().url, "http://0.0.0.0:9102/");
    }

    #[test]
    fn test_summary() {
        let service = AgentService::build(AgentKind::ElevenLabs, &settings()).unwrap();
        let summary = service.summary();
        assert_eq!(summary.name, "elevenlabs_agent");
        assert_eq!(summary.model, "none");
        assert_eq!(summary.tools_count, 1);
        assert_eq!(summary.skills, vec!["Convert Text to Speech", "Voice Synthesis"]);
    }

    #[test]
    fn test_history_from_context() {
        let context = serde_json::json!({
            "history": [
                {"role": "user", "content": "find notes"},
                {"role": "assistant", "content": "found 3"},
                {"role": "system", "content": "ignored"},
                {"role": "user"}
            ]
        });
        let history = history_from_context(&context);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert!(history_from_context(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_executes_with_default_prompt_fallback() {
        let service = AgentService::build(AgentKind::Notion, &settings()).unwrap();
        assert_eq!(service.default_prompt(), "Search for recent pages");
        let turn = service
            .execute("quarterly goals", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(turn.used_fallback);
        assert!(turn.text.contains("quarterly goals"));
        service.shutdown().await;
    }

    /// Serve `service` on a loopback port with the task budget `serve` uses
    async fn spawn_service(service: Arc<AgentService>, settings: &Settings) -> String {
        let server = Arc::new(A2aServer::new(
            service.card().clone(),
            service.clone(),
            settings.task_timeout(service.kind()),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, relay_a2a::server::router(server))
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_hung_tool_server_answers_with_canned_reply() {
        // The MCP request limit outlasts the task budget, as with the defaults
        let settings = Settings::from_lookup(|key| match key {
            "A2A_TIMEOUT" => Some("1".to_string()),
            "MCP_TIMEOUT" => Some("3".to_string()),
            _ => None,
        })
        .unwrap();
        let hung = McpClientConfig {
            name: "notion".to_string(),
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
            env: vec![],
            request_timeout: settings.mcp_timeout(),
        };
        let service = Arc::new(
            AgentService::build_with_server(AgentKind::Notion, &settings, Some(hung)).unwrap(),
        );
        let url = spawn_service(service.clone(), &settings).await;

        let client = A2aClient::new(settings.client_timeout(AgentKind::Notion)).unwrap();
        let task = client
            .submit_task(&url, "roadmap", serde_json::json!({}), true)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.unwrap(), fallback::notion_search("roadmap"));
        assert_eq!(task.trace.tool_calls[0].name, "notion_search");
        service.shutdown().await;
    }
}
