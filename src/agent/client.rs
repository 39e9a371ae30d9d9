//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations.

use std::sync::Arc;

use crate::agent::config::ModelEndpoint;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Creates an [`LlmProvider`] bound to the endpoint's model.
///
/// # Supported Providers
///
/// - `"ollama"` (default): a local or remote Ollama server
/// - `"openai"`: OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(endpoint: &ModelEndpoint) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match endpoint.provider.as_str() {
        "ollama" => Ok(Arc::new(OpenAiProvider::ollama(endpoint))),
        "openai" => Ok(Arc::new(OpenAiProvider::openai(endpoint))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::{AgentConfig, ModelRole};

    #[test]
    fn test_create_providers_per_role() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        let fast = create_provider(config.endpoint(ModelRole::Fast))
            .unwrap_or_else(|_| unreachable!());
        let deliberate = create_provider(config.endpoint(ModelRole::Deliberate))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(fast.name(), "ollama");
        assert_eq!(fast.model(), "llama3.1");
        assert_eq!(deliberate.model(), "deepseek-r1:8b");
    }

    #[test]
    fn test_create_openai_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("openai")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_provider(&config.router);
        assert!(provider.is_ok());
        assert_eq!(provider.map(|p| p.name()).unwrap_or_default(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = AgentConfig::builder()
            .provider("unknown")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_provider(&config.router);
        assert!(
            matches!(result, Err(AgentError::UnsupportedProvider { name }) if name == "unknown")
        );
    }
}
