//! LLM provider abstraction
//!
//! Agents talk to a model through the [`LlmProvider`] trait. The only
//! hosted backend is Google Gemini ([`GeminiProvider`]).

pub mod gemini;
pub mod types;

pub use gemini::GeminiProvider;
pub use types::{
    ChatBlock, ChatMessage, ChatMessageContent, ChatResponse, ChatResponseBlock, ChatRole,
    ChatUsage, LlmProvider, StopReason,
};
