//! Host agent: routes requests to the workers through `delegate_task`

use anyhow::Result;
use relay_a2a::{AgentSkill, DelegateTaskTool, PeerDirectory};
use relay_core::fallback;
use relay_core::tools::ToolRegistry;
use relay_core::{AgentKind, Fallback, LlmAgent, Settings};
use std::sync::Arc;

pub const INSTRUCTION: &str = include_str!("../prompts/host.md");
pub const DESCRIPTION: &str =
    "Master orchestrator that coordinates Notion and ElevenLabs agents via A2A protocol";
pub const DEFAULT_PROMPT: &str = "What can you help me with?";

pub fn skills() -> Vec<AgentSkill> {
    vec![
        AgentSkill::new(
            "orchestrate_workflows",
            "Orchestrate Multi-Agent Workflows",
            "Coordinate complex workflows between Notion information retrieval and ElevenLabs text-to-speech generation",
            &["orchestration", "workflow", "coordination", "multi-agent", "automation"],
            &[
                "Search Notion for project updates and convert to speech",
                "Find meeting notes and generate audio summary",
                "Count database entries and announce the results",
            ],
        ),
        AgentSkill::new(
            "task_delegation",
            "Intelligent Task Delegation",
            "Analyze user requests and delegate appropriate tasks to specialized agents",
            &["delegation", "analysis", "routing", "optimization"],
            &[
                "Route search queries to Notion agent",
                "Send text-to-speech requests to ElevenLabs agent",
                "Chain multiple operations across agents",
            ],
        ),
        AgentSkill::new(
            "response_synthesis",
            "Response Synthesis",
            "Combine and synthesize responses from multiple agents into coherent results",
            &["synthesis", "integration", "coordination", "results"],
            &[
                "Combine search results with audio generation",
                "Provide unified responses from multiple data sources",
            ],
        ),
    ]
}

/// The workers the host may delegate to
pub fn peers(settings: &Settings) -> PeerDirectory {
    PeerDirectory::from_settings(settings, &[AgentKind::Notion, AgentKind::ElevenLabs])
}

/// The orchestrator agent
pub fn agent(settings: &Settings) -> Result<LlmAgent> {
    let mut tools = ToolRegistry::new();
    // Every peer is a worker, so one wait covers all of them
    tools.register(Arc::new(DelegateTaskTool::new(
        peers(settings),
        settings.client_timeout(AgentKind::Notion),
    )?));

    Ok(LlmAgent::new("host_agent", DESCRIPTION, INSTRUCTION)
        .with_tools(tools)
        .with_provider(crate::provider(settings))
        .with_fallback(Fallback::Canned(fallback::model_unavailable(
            AgentKind::Host.display_name(),
        ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_exclude_host() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let dir = peers(&settings);
        assert_eq!(dir.names(), vec!["notion_agent", "elevenlabs_agent"]);
    }

    #[test]
    fn test_instruction_names_the_tool() {
        assert!(INSTRUCTION.contains("delegate_task"));
        assert!(!INSTRUCTION.contains("delegate_task_sync"));
    }

    #[tokio::test]
    async fn test_host_without_model_explains() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let agent = agent(&settings).unwrap();
        assert_eq!(agent.tools().names(), vec!["delegate_task"]);
        assert_eq!(agent.model(), "none");

        let turn = agent.run("Search my Notion workspace", &[]).await;
        assert!(turn.used_fallback);
        assert_eq!(
            turn.text,
            "The Host Agent cannot reach its language model right now, \
             so it cannot plan or delegate this request.\n\n\
             Cause: no language model is configured"
        );
        assert_eq!(turn.text.matches("Cause:").count(), 1);
        assert!(turn.trace.is_empty());
    }
}
