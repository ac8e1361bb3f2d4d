//! Agent runtime: a model-driven tool-use loop with a fallback policy

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::providers::{ChatBlock, ChatMessage, ChatMessageContent, LlmProvider};
use crate::tools::{ToolExecutor, ToolRegistry};

/// Maximum model turns per request
pub const MAX_TOOL_TURNS: usize = 8;

/// What an agent does when its model cannot be used
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback {
    /// Forward the prompt straight to a tool, as `{argument: prompt}`
    DirectTool { tool: String, argument: String },
    /// Reply with fixed text; the cause is appended
    Canned(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseRecord {
    pub name: String,
    pub response: Value,
}

/// Tool calls and results produced while answering one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolTrace {
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub tool_responses: Vec<ToolResponseRecord>,
}

impl ToolTrace {
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.tool_responses.is_empty()
    }

    fn record(&mut self, name: &str, args: Value, response: &str) {
        self.tool_calls.push(ToolCallRecord {
            name: name.to_string(),
            args,
        });
        self.tool_responses.push(ToolResponseRecord {
            name: name.to_string(),
            response: Value::String(response.to_string()),
        });
    }
}

/// Result of one agent turn
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub text: String,
    pub trace: ToolTrace,
    pub used_fallback: bool,
}

/// An agent: instructions, tools, an optional model and a fallback
pub struct LlmAgent {
    name: String,
    description: String,
    instruction: String,
    tools: ToolRegistry,
    provider: Option<Arc<dyn LlmProvider>>,
    fallback: Fallback,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instruction: instruction.into(),
            tools: ToolRegistry::new(),
            provider: None,
            fallback: Fallback::Canned("The language model is unavailable.".to_string()),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_provider(mut self, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Model identifier, or "none" when running without a model
    pub fn model(&self) -> &str {
        self.provider.as_ref().map(|p| p.model()).unwrap_or("none")
    }

    pub fn has_model(&self) -> bool {
        self.provider.is_some()
    }

    /// Answer one prompt given the prior conversation
    pub async fn run(&self, prompt: &str, history: &[ChatMessage]) -> AgentTurn {
        let Some(provider) = &self.provider else {
            debug!(agent = %self.name, "No model configured, using fallback");
            return self
                .apply_fallback(prompt, "no language model is configured", ToolTrace::default())
                .await;
        };

        let mut messages: Vec<ChatMessage> = history.to_vec();
        messages.push(ChatMessage::user(prompt));

        let tool_definitions = self.tools.list_tools();
        let mut trace = ToolTrace::default();
        let mut last_text = String::new();

        for turn in 1..=MAX_TOOL_TURNS {
            debug!(agent = %self.name, turn, "Agent loop turn");

            let response = match provider
                .chat(&messages, &tool_definitions, &self.instruction)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(agent = %self.name, error = %e, "Model call failed");
                    return self.apply_fallback(prompt, &e.to_string(), trace).await;
                }
            };

            let text = response.text();
            if !text.is_empty() {
                last_text = text.clone();
            }

            let calls = response.tool_calls();
            if calls.is_empty() {
                info!(
                    agent = %self.name,
                    turns = turn,
                    tool_calls = trace.tool_calls.len(),
                    "Agent turn complete"
                );
                return AgentTurn {
                    text: final_text(text, &trace),
                    trace,
                    used_fallback: false,
                };
            }

            let mut assistant_blocks = Vec::new();
            if !text.is_empty() {
                assistant_blocks.push(ChatBlock::Text { text });
            }
            let mut result_blocks = Vec::new();

            for (id, name, input) in calls {
                assistant_blocks.push(ChatBlock::ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                });

                let output = match self.tools.execute(name, input.clone()).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(agent = %self.name, tool = %name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };

                trace.record(name, input.clone(), &output);
                result_blocks.push(ChatBlock::ToolResult {
                    tool_call_id: id.to_string(),
                    name: name.to_string(),
                    content: output,
                });
            }

            messages.push(ChatMessage {
                role: crate::providers::ChatRole::Assistant,
                content: ChatMessageContent::Blocks(assistant_blocks),
            });
            messages.push(ChatMessage {
                role: crate::providers::ChatRole::User,
                content: ChatMessageContent::Blocks(result_blocks),
            });
        }

        warn!(agent = %self.name, turns = MAX_TOOL_TURNS, "Tool turn limit reached");
        let text = if last_text.is_empty() {
            "I've reached the maximum number of tool calls for this request.".to_string()
        } else {
            last_text
        };
        AgentTurn {
            text: final_text(text, &trace),
            trace,
            used_fallback: false,
        }
    }

    async fn apply_fallback(&self, prompt: &str, cause: &str, mut trace: ToolTrace) -> AgentTurn {
        let text = match &self.fallback {
            Fallback::DirectTool { tool, argument } => {
                let mut map = serde_json::Map::new();
                map.insert(argument.clone(), Value::String(prompt.to_string()));
                let args = Value::Object(map);
                let output = match self.tools.execute(tool, args.clone()).await {
                    Ok(output) => output,
                    Err(e) => format!("Error: {e}"),
                };
                trace.record(tool, args, &output);
                output
            }
            Fallback::Canned(text) => format!("{text}\n\nCause: {cause}"),
        };

        AgentTurn {
            text,
            trace,
            used_fallback: true,
        }
    }
}

/// Use the model's text; when it said nothing, surface the last tool result
fn final_text(text: String, trace: &ToolTrace) -> String {
    if !text.trim().is_empty() {
        return text;
    }
    trace
        .tool_responses
        .last()
        .and_then(|r| r.response.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "(no response)".to_string())
}
