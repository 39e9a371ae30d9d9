//! Provider-agnostic request and response types for LLM communication.
//!
//! These types decouple agent logic from any specific LLM SDK, so the
//! same agents run against a hosted API or a local model server.

use serde::{Deserialize, Serialize};

/// A chat completion request carrying one rendered prompt.
///
/// The model is not part of the request: each provider instance is bound
/// to one model at construction time.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The prompt, sent as a single user message.
    pub prompt: String,
    /// Sampling temperature (0.0–2.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Request JSON-formatted output.
    pub json_mode: bool,
    /// Stream the response.
    pub stream: bool,
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// A chat completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Generated text content.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Finish reason from the model (e.g., `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}
