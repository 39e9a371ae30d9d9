//! Agent trait definition.
//!
//! The router, retriever and responder all implement this trait, which
//! provides a uniform way to turn a rendered prompt into a model call.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::{LlmProvider, TextStream};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

impl AgentResponse {
    /// Whether generation stopped at the token limit.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Trait implemented by all agents in the pipeline.
///
/// Agents encapsulate one role with a fixed generation configuration. The
/// prompt is sent as a single user message; the model itself is chosen by
/// the provider instance passed in.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature. Every pipeline call is deterministic by default.
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the request for `prompt` from this agent's configuration.
    fn request(&self, prompt: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            stream,
        }
    }

    /// Executes the agent with the given prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or response parsing errors.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.request(prompt, false);
        let response: ChatResponse = provider.chat(&request).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Executes the agent with the given prompt, yielding text as it arrives.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the stream cannot be opened.
    async fn execute_stream(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
    ) -> Result<TextStream, AgentError> {
        let request = self.request(prompt, true);
        provider.chat_stream(&request).await
    }
}
