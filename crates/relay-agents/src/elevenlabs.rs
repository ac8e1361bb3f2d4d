//! ElevenLabs worker: text-to-speech over the ElevenLabs MCP server

use anyhow::Result;
use async_trait::async_trait;
use relay_a2a::AgentSkill;
use relay_core::fallback;
use relay_core::tools::{ToolHandler, ToolRegistry, json_schema, required_str};
use relay_core::{Fallback, LlmAgent, Settings};
use relay_mcp::McpClientConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::ToolServer;

pub const INSTRUCTION: &str = include_str!("../prompts/elevenlabs.md");
pub const DESCRIPTION: &str = "Specialized agent for converting text to speech using ElevenLabs";
pub const DEFAULT_PROMPT: &str = "Convert 'Hello world' to speech";

const REMOTE_TEXT_TO_SPEECH: &str = "text_to_speech";

/// How to launch the ElevenLabs MCP server; `None` without an API key
pub fn server_config(settings: &Settings) -> Option<McpClientConfig> {
    if settings.elevenlabs_api_key.is_empty() {
        return None;
    }
    Some(McpClientConfig {
        name: "elevenlabs".to_string(),
        command: "uvx".to_string(),
        args: vec!["elevenlabs-mcp".to_string()],
        env: vec![(
            "ELEVENLABS_API_KEY".to_string(),
            settings.elevenlabs_api_key.clone(),
        )],
        request_timeout: settings.mcp_timeout(),
    })
}

pub fn skills() -> Vec<AgentSkill> {
    vec![
        AgentSkill::new(
            "text_to_speech",
            "Convert Text to Speech",
            "Convert any text input into high-quality speech audio using ElevenLabs",
            &["tts", "audio", "speech", "elevenlabs", "voice"],
            &[
                "Convert 'Hello world' to speech",
                "Read this paragraph aloud",
                "Generate audio for presentation script",
            ],
        ),
        AgentSkill::new(
            "voice_synthesis",
            "Voice Synthesis",
            "Generate natural-sounding speech with various voice options",
            &["synthesis", "voice", "natural", "generation"],
            &[
                "Use a professional voice for business content",
                "Generate speech with emotional expression",
                "Create audio with specific voice characteristics",
            ],
        ),
    ]
}

/// `text_to_speech(text, voice?)`
pub struct TextToSpeechTool {
    server: Option<Arc<dyn ToolServer>>,
    default_voice: String,
}

impl TextToSpeechTool {
    pub fn new(server: Option<Arc<dyn ToolServer>>, default_voice: &str) -> Self {
        Self {
            server,
            default_voice: default_voice.to_string(),
        }
    }
}

#[async_trait]
impl ToolHandler for TextToSpeechTool {
    fn name(&self) -> &str {
        "text_to_speech"
    }

    fn description(&self) -> &str {
        "Convert text to speech audio with ElevenLabs and return the audio file path."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "text": {
                    "type": "string",
                    "description": "Text to speak"
                },
                "voice": {
                    "type": "string",
                    "description": "Voice name; omit for the default voice"
                }
            }),
            vec!["text"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let text = required_str(&input, "text")?;
        let voice = input
            .get("voice")
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_voice);

        let Some(server) = &self.server else {
            debug!("ELEVENLABS_API_KEY not set, answering with canned speech result");
            return Ok(fallback::text_to_speech(text, voice, fallback::now_timestamp()));
        };

        let mut args = serde_json::json!({ "text": text });
        if voice != "default" {
            args["voice_name"] = Value::String(voice.to_string());
        }

        match server.call_tool(REMOTE_TEXT_TO_SPEECH, args).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Text-to-speech failed: {:#}", e);
                Ok(fallback::text_to_speech(text, voice, fallback::now_timestamp()))
            }
        }
    }
}

/// The ElevenLabs worker agent
pub fn agent(settings: &Settings, server: Option<Arc<dyn ToolServer>>) -> LlmAgent {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(TextToSpeechTool::new(
        server,
        &settings.elevenlabs_voice_id,
    )));

    LlmAgent::new("elevenlabs_agent", DESCRIPTION, INSTRUCTION)
        .with_tools(tools)
        .with_provider(crate::provider(settings))
        .with_fallback(Fallback::DirectTool {
            tool: "text_to_speech".to_string(),
            argument: "text".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::StubServer;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        Settings::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_server_config() {
        assert!(server_config(&settings(&[])).is_none());
        let config = server_config(&settings(&[("ELEVENLABS_API_KEY", "sk_1")])).unwrap();
        assert_eq!(config.command, "uvx");
        assert_eq!(config.args, vec!["elevenlabs-mcp"]);
        assert_eq!(
            config.env,
            vec![("ELEVENLABS_API_KEY".to_string(), "sk_1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_default_voice_is_not_sent() {
        let stub = Arc::new(StubServer::answering("Audio file saved at `/tmp/a.mp3`"));
        let tool = TextToSpeechTool::new(Some(stub.clone()), "default");
        let out = tool
            .execute(serde_json::json!({"text": "Hello world"}))
            .await
            .unwrap();
        assert!(out.contains("/tmp/a.mp3"));
        let (name, args) = &stub.calls()[0];
        assert_eq!(name, "text_to_speech");
        assert_eq!(args["text"], "Hello world");
        assert!(args.get("voice_name").is_none());
    }

    #[tokio::test]
    async fn test_voice_override() {
        let stub = Arc::new(StubServer::answering("ok"));
        let tool = TextToSpeechTool::new(Some(stub.clone()), "Rachel");
        tool.execute(serde_json::json!({"text": "hi"})).await.unwrap();
        tool.execute(serde_json::json!({"text": "hi", "voice": "Adam"}))
            .await
            .unwrap();
        let calls = stub.calls();
        assert_eq!(calls[0].1["voice_name"], "Rachel");
        assert_eq!(calls[1].1["voice_name"], "Adam");
    }

    #[tokio::test]
    async fn test_failure_is_canned() {
        let tool = TextToSpeechTool::new(Some(Arc::new(StubServer::failing())), "default");
        let out = tool
            .execute(serde_json::json!({"text": "one two three four"}))
            .await
            .unwrap();
        assert!(out.contains("Text-to-Speech Complete"));
        assert!(out.contains("Default ElevenLabs voice"));
        assert!(out.contains("~2.0 seconds"));
    }

    #[tokio::test]
    async fn test_agent_without_model_speaks_directly() {
        let agent = agent(&settings(&[]), None);
        let turn = agent.run("Hello from Relay", &[]).await;
        assert!(turn.used_fallback);
        assert!(turn.text.contains("Hello from Relay"));
        assert!(turn.text.contains("/tmp/audio_"));
        assert_eq!(turn.trace.tool_calls[0].args["text"], "Hello from Relay");
    }
}
