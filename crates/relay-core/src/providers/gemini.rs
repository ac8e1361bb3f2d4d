//! Google Gemini provider (generateContent with function calling)

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason,
};
use crate::tools::ToolDefinition;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let request = build_request(messages, tools, system);

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send Gemini request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini request failed with status {status}: {body}");
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        parse_response(body)
    }
}

fn build_request(
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
    system: &str,
) -> GenerateContentRequest {
    let system_instruction = (!system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: Some(system.to_string()),
            ..Default::default()
        }],
    });

    let contents = messages.iter().map(to_content).collect();

    let tools = if tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                })
                .collect(),
        }]
    };

    GenerateContentRequest {
        system_instruction,
        contents,
        tools,
    }
}

fn to_content(message: &ChatMessage) -> Content {
    let role = match message.role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    };

    let parts = match &message.content {
        ChatMessageContent::Text(text) => vec![Part {
            text: Some(text.clone()),
            ..Default::default()
        }],
        ChatMessageContent::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                ChatBlock::Text { text } => Part {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                ChatBlock::ToolCall { name, input, .. } => Part {
                    function_call: Some(FunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    }),
                    ..Default::default()
                },
                ChatBlock::ToolResult { name, content, .. } => Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: serde_json::json!({ "content": content }),
                    }),
                    ..Default::default()
                },
            })
            .collect(),
    };

    Content {
        role: Some(role.to_string()),
        parts,
    }
}

fn parse_response(body: GenerateContentResponse) -> Result<ChatResponse> {
    let usage = body
        .usage_metadata
        .map(|u| ChatUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = body.candidates.into_iter().next() else {
        let reason = body
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(anyhow!("Gemini returned no answer: {}", reason));
    };

    let mut blocks = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(call) = part.function_call {
            let input = if call.args.is_null() {
                serde_json::json!({})
            } else {
                call.args
            };
            blocks.push(ChatResponseBlock::ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                name: call.name,
                input,
            });
        } else if let Some(text) = part.text
            && !text.is_empty()
        {
            blocks.push(ChatResponseBlock::Text { text });
        }
    }

    let has_tool_calls = blocks
        .iter()
        .any(|b| matches!(b, ChatResponseBlock::ToolCall { .. }));

    let stop_reason = if has_tool_calls {
        StopReason::ToolUse
    } else {
        match candidate.finish_reason.as_deref() {
            Some("STOP") | None => StopReason::EndTurn,
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            Some(_) => StopReason::Unknown,
        }
    };

    Ok(ChatResponse {
        blocks,
        stop_reason,
        usage,
    })
}
