//! Provider-agnostic chat types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolDefinition;

/// One message of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: ChatMessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Content of a chat message, either plain text or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageContent {
    Text(String),
    Blocks(Vec<ChatBlock>),
}

/// A single block within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

/// Response from one model call
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub blocks: Vec<ChatResponseBlock>,
    pub stop_reason: StopReason,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone)]
pub enum ChatResponseBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Unknown,
}

/// Token usage from a single API call
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait that every LLM backend implements
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "gemini")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gemini-2.0-flash")
    fn model(&self) -> &str;

    /// Send a chat request with tools and a system instruction
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse>;
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: ChatMessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: ChatMessageContent::Text(text.into()),
        }
    }
}

impl ChatResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ChatResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool calls requested by the model, as (id, name, input)
    pub fn tool_calls(&self) -> Vec<(&str, &str, &Value)> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ChatResponseBlock::ToolCall { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl StopReason {
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_role_display() {
        assert_eq!(ChatRole::User.to_string(), "user");
        assert_eq!(ChatRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_stop_reason_predicates() {
        assert!(StopReason::ToolUse.is_tool_use());
        assert!(!StopReason::EndTurn.is_tool_use());
        assert!(!StopReason::Unknown.is_tool_use());
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, ChatRole::User);
        match &msg.content {
            ChatMessageContent::Text(t) => assert_eq!(t, "hello"),
            _ => panic!("expected text content"),
        }
        assert_eq!(ChatMessage::assistant("hi").role, ChatRole::Assistant);
    }

    #[test]
    fn test_untagged_content_parses_plain_string() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"response"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Assistant);
        assert!(matches!(msg.content, ChatMessageContent::Text(ref t) if t == "response"));
    }

    #[test]
    fn test_response_text_and_tool_calls() {
        let response = ChatResponse {
            blocks: vec![
                ChatResponseBlock::Text {
                    text: "Let me look".to_string(),
                },
                ChatResponseBlock::ToolCall {
                    id: "call_1".to_string(),
                    name: "notion_search".to_string(),
                    input: serde_json::json!({"query": "roadmap"}),
                },
                ChatResponseBlock::Text {
                    text: "that up".to_string(),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: ChatUsage::default(),
        };
        assert_eq!(response.text(), "Let me look\nthat up");
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "notion_search");
        assert_eq!(calls[0].2["query"], "roadmap");
    }
}
