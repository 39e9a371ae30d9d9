//! `OpenAI`-compatible provider implementation using the `async-openai` crate.
//!
//! Serves both hosted `OpenAI` and local Ollama, which exposes the same chat
//! completion API under `/v1`.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionStreamResponse, ResponseFormat,
};
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::agent::config::ModelEndpoint;
use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
use crate::agent::provider::{LlmProvider, TextStream};
use crate::error::AgentError;
use crate::index::embedding::OLLAMA_BASE_URL;

/// Ollama ignores the key, but the client always sends one.
const OLLAMA_PLACEHOLDER_KEY: &str = "ollama";

/// `OpenAI`-compatible LLM provider bound to one model.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    name: &'static str,
    model: String,
    /// Send `max_tokens` instead of `max_completion_tokens`.
    legacy_max_tokens: bool,
}

impl OpenAiProvider {
    /// Creates a provider for hosted `OpenAI` (or a compatible proxy).
    #[must_use]
    pub fn openai(endpoint: &ModelEndpoint) -> Self {
        let mut openai_config = OpenAIConfig::new();
        if let Some(ref key) = endpoint.api_key {
            openai_config = openai_config.with_api_key(key);
        }
        if let Some(ref base_url) = endpoint.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            name: "openai",
            model: endpoint.model.clone(),
            legacy_max_tokens: false,
        }
    }

    /// Creates a provider for an Ollama server.
    #[must_use]
    pub fn ollama(endpoint: &ModelEndpoint) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(endpoint.api_key.as_deref().unwrap_or(OLLAMA_PLACEHOLDER_KEY))
            .with_api_base(endpoint.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL));

        Self {
            client: Client::with_config(openai_config),
            name: "ollama",
            model: endpoint.model.clone(),
            legacy_max_tokens: true,
        }
    }

    /// Wraps the prompt as the single user message of the request.
    fn user_message(prompt: &str) -> ChatCompletionRequestMessage {
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
            name: None,
        })
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    #[allow(deprecated)]
    fn build_request(&self, request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages = vec![Self::user_message(&request.prompt)];

        let response_format = if request.json_mode {
            Some(ResponseFormat::JsonObject)
        } else {
            None
        };

        let (max_tokens, max_completion_tokens) = if self.legacy_max_tokens {
            (request.max_tokens, None)
        } else {
            (None, request.max_tokens)
        };

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens,
            max_completion_tokens,
            stream: if request.stream { Some(true) } else { None },
            response_format,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = self.build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        let mut stream_request = request.clone();
        stream_request.stream = true;
        let openai_request = self.build_request(&stream_request);

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
            })?;

        let mapped = stream.map(
            |result: Result<
                CreateChatCompletionStreamResponse,
                async_openai::error::OpenAIError,
            >| {
                match result {
                    Ok(response) => {
                        let text = response
                            .choices
                            .first()
                            .and_then(|c| c.delta.content.as_ref())
                            .cloned()
                            .unwrap_or_default();
                        Ok(text)
                    }
                    Err(e) => Err(AgentError::Stream {
                        message: e.to_string(),
                    }),
                }
            },
        );

        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(model: &str) -> ModelEndpoint {
        ModelEndpoint {
            provider: "ollama".to_string(),
            model: model.to_string(),
            base_url: None,
            api_key: None,
        }
    }

    fn request(json_mode: bool, stream: bool) -> ChatRequest {
        ChatRequest {
            prompt: "test".to_string(),
            temperature: Some(0.0),
            max_tokens: Some(100),
            json_mode,
            stream,
        }
    }

    #[test]
    fn test_prompt_is_single_user_message() {
        let provider = OpenAiProvider::ollama(&endpoint("llama3.1"));
        let built = provider.build_request(&request(false, false));
        assert_eq!(built.messages.len(), 1);
        assert!(matches!(
            built.messages.first(),
            Some(ChatCompletionRequestMessage::User(_))
        ));
    }

    #[test]
    fn test_build_request_uses_bound_model() {
        let provider = OpenAiProvider::ollama(&endpoint("deepseek-r1:8b"));
        let built = provider.build_request(&request(false, false));
        assert_eq!(built.model, "deepseek-r1:8b");
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "deepseek-r1:8b");
    }

    #[test]
    fn test_build_request_keeps_zero_temperature() {
        let provider = OpenAiProvider::ollama(&endpoint("llama3.1"));
        let built = provider.build_request(&request(false, false));
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    #[allow(deprecated)]
    fn test_build_request_token_limit_field() {
        let ollama = OpenAiProvider::ollama(&endpoint("llama3.1"));
        let built = ollama.build_request(&request(false, false));
        assert_eq!(built.max_tokens, Some(100));
        assert!(built.max_completion_tokens.is_none());

        let openai = OpenAiProvider::openai(&ModelEndpoint {
            provider: "openai".to_string(),
            api_key: Some("key".to_string()),
            ..endpoint("gpt-4o-mini")
        });
        let built = openai.build_request(&request(false, false));
        assert!(built.max_tokens.is_none());
        assert_eq!(built.max_completion_tokens, Some(100));
    }

    #[test]
    fn test_build_request_json_mode_and_streaming() {
        let provider = OpenAiProvider::ollama(&endpoint("llama3.1"));
        let built = provider.build_request(&request(true, false));
        assert!(built.response_format.is_some());
        assert!(built.stream.is_none());

        let built = provider.build_request(&request(false, true));
        assert!(built.response_format.is_none());
        assert_eq!(built.stream, Some(true));
    }
}
