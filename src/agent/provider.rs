//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Every instance is bound to a single
//! model, so choosing a model means choosing a provider instance.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, stream};

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// A stream of generated text fragments, in generation order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific backend while
/// presenting a uniform "generate text from a prompt" interface to agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"ollama"`).
    fn name(&self) -> &'static str;

    /// Model this instance generates with.
    fn model(&self) -> &str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request.
    ///
    /// The default implementation runs [`LlmProvider::chat`] and yields the
    /// complete text as a single fragment.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        let response = self.chat(request).await?;
        Ok(Box::pin(stream::iter([Ok(response.content)])))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    struct Echo;

    #[async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: request.prompt.to_uppercase(),
                ..ChatResponse::default()
            })
        }
    }

    #[tokio::test]
    async fn test_default_stream_yields_single_fragment() {
        let request = ChatRequest {
            prompt: "hello".to_string(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
            stream: true,
        };
        let stream = Echo.chat_stream(&request).await;
        assert!(stream.is_ok());
        let fragments: Vec<Result<String, AgentError>> = match stream {
            Ok(s) => s.collect().await,
            Err(_) => unreachable!(),
        };
        assert_eq!(fragments.len(), 1);
        assert!(matches!(fragments.first(), Some(Ok(text)) if text == "HELLO"));
    }
}
