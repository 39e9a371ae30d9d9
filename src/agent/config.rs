//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Every pipeline role gets its own [`ModelEndpoint`]; role-specific settings
//! fall back to the global provider, base URL and API key.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;
use crate::index::embedding::EmbeddingConfig;

/// Default provider for every role.
pub const DEFAULT_PROVIDER: &str = "ollama";
/// Default model for the router, retriever and fast responder.
const DEFAULT_MODEL: &str = "llama3.1";
/// Default model for the deliberate responder.
const DEFAULT_DELIBERATE_MODEL: &str = "deepseek-r1:8b";
/// Default number of passages fetched per retrieval.
pub const DEFAULT_TOP_K: usize = 3;
/// Default index database location.
const DEFAULT_INDEX_PATH: &str = "knowledge_base/index.db";
/// Default subject the router treats as answerable from the index.
const DEFAULT_KNOWLEDGE_DOMAIN: &str = "Kredivo";
/// Default router max tokens. Two short JSON objects.
const DEFAULT_ROUTER_MAX_TOKENS: u32 = 512;
/// Default query-expansion max tokens. Three search terms.
const DEFAULT_RETRIEVER_MAX_TOKENS: u32 = 64;
/// Default responder max tokens.
const DEFAULT_RESPONDER_MAX_TOKENS: u32 = 4096;

/// A pipeline role that talks to a language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Classifies the question.
    Router,
    /// Expands the question into a search query.
    Retriever,
    /// Answers questions that need no deliberation.
    Fast,
    /// Answers questions the router flags for deep reasoning.
    Deliberate,
}

impl ModelRole {
    /// All roles, in pipeline order.
    pub const ALL: [Self; 4] = [Self::Router, Self::Retriever, Self::Fast, Self::Deliberate];

    /// Lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Retriever => "retriever",
            Self::Fast => "fast",
            Self::Deliberate => "deliberate",
        }
    }

    /// Environment variable prefix for role-specific settings.
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Router => "RAG_ROUTER",
            Self::Retriever => "RAG_RETRIEVER",
            Self::Fast => "RAG_FAST",
            Self::Deliberate => "RAG_DELIBERATE",
        }
    }

    const fn default_model(self) -> &'static str {
        match self {
            Self::Deliberate => DEFAULT_DELIBERATE_MODEL,
            Self::Router | Self::Retriever | Self::Fast => DEFAULT_MODEL,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Router => 0,
            Self::Retriever => 1,
            Self::Fast => 2,
            Self::Deliberate => 3,
        }
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    /// Provider name (`"openai"` or `"ollama"`).
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Optional base URL override (for proxies, vLLM or remote Ollama).
    pub base_url: Option<String>,
    /// API key, when the provider needs one.
    pub api_key: Option<String>,
}

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Router endpoint.
    pub router: ModelEndpoint,
    /// Query-expansion endpoint.
    pub retriever: ModelEndpoint,
    /// Fast responder endpoint.
    pub fast: ModelEndpoint,
    /// Deliberate responder endpoint.
    pub deliberate: ModelEndpoint,
    /// Embedding backend used by the document index.
    pub embedding: EmbeddingConfig,
    /// Maximum tokens for each router classification.
    pub router_max_tokens: u32,
    /// Maximum tokens for the query expansion.
    pub retriever_max_tokens: u32,
    /// Maximum tokens for the reply.
    pub responder_max_tokens: u32,
    /// Passages fetched per retrieval.
    pub top_k: usize,
    /// Location of the `SQLite` document index.
    pub index_path: PathBuf,
    /// Subject matter the router treats as covered by the index.
    pub knowledge_domain: String,
    /// Directory containing prompt template files.
    ///
    /// When set, prompts are loaded from markdown files in this directory,
    /// falling back to compiled-in defaults for any missing files.
    pub prompt_dir: Option<PathBuf>,
    /// Caller-level limit on a whole turn. `None` disables it.
    pub timeout: Option<Duration>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if an `openai` role has no key.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Endpoint configured for `role`.
    #[must_use]
    pub const fn endpoint(&self, role: ModelRole) -> &ModelEndpoint {
        match role {
            ModelRole::Router => &self.router,
            ModelRole::Retriever => &self.retriever,
            ModelRole::Fast => &self.fast,
            ModelRole::Deliberate => &self.deliberate,
        }
    }
}

/// Role-specific overrides held by the builder.
#[derive(Debug, Clone, Default)]
struct RoleOverrides {
    provider: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    roles: [RoleOverrides; 4],
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    embedding_base_url: Option<String>,
    router_max_tokens: Option<u32>,
    retriever_max_tokens: Option<u32>,
    responder_max_tokens: Option<u32>,
    top_k: Option<usize>,
    index_path: Option<PathBuf>,
    knowledge_domain: Option<String>,
    prompt_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = env_var("RAG_PROVIDER");
        }
        if self.api_key.is_none() {
            self.api_key = env_var("RAG_API_KEY").or_else(|| env_var("OPENAI_API_KEY"));
        }
        if self.base_url.is_none() {
            self.base_url = env_var("RAG_BASE_URL").or_else(|| env_var("OPENAI_BASE_URL"));
        }
        for role in ModelRole::ALL {
            let prefix = role.env_prefix();
            let overrides = &mut self.roles[role.index()];
            if overrides.provider.is_none() {
                overrides.provider = env_var(&format!("{prefix}_PROVIDER"));
            }
            if overrides.model.is_none() {
                overrides.model = env_var(&format!("{prefix}_MODEL"));
            }
            if overrides.base_url.is_none() {
                overrides.base_url = env_var(&format!("{prefix}_BASE_URL"));
            }
        }
        if self.embedding_provider.is_none() {
            self.embedding_provider = env_var("RAG_EMBEDDING_PROVIDER");
        }
        if self.embedding_model.is_none() {
            self.embedding_model = env_var("RAG_EMBEDDING_MODEL");
        }
        if self.embedding_base_url.is_none() {
            self.embedding_base_url = env_var("RAG_EMBEDDING_BASE_URL");
        }
        if self.top_k.is_none() {
            self.top_k = env_var("RAG_TOP_K").and_then(|v| v.parse().ok());
        }
        if self.index_path.is_none() {
            self.index_path = env_var("RAG_INDEX_PATH").map(PathBuf::from);
        }
        if self.knowledge_domain.is_none() {
            self.knowledge_domain = env_var("RAG_KNOWLEDGE_DOMAIN");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env_var("RAG_PROMPT_DIR").map(PathBuf::from);
        }
        if self.timeout.is_none() {
            self.timeout = env_var("RAG_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        self
    }

    /// Sets the provider used by every role without its own override.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL used by every role without its own override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model for one role.
    #[must_use]
    pub fn model(mut self, role: ModelRole, model: impl Into<String>) -> Self {
        self.roles[role.index()].model = Some(model.into());
        self
    }

    /// Sets the provider for one role.
    #[must_use]
    pub fn role_provider(mut self, role: ModelRole, provider: impl Into<String>) -> Self {
        self.roles[role.index()].provider = Some(provider.into());
        self
    }

    /// Sets the base URL for one role.
    #[must_use]
    pub fn role_base_url(mut self, role: ModelRole, url: impl Into<String>) -> Self {
        self.roles[role.index()].base_url = Some(url.into());
        self
    }

    /// Sets the embedding provider (`openai`, `ollama`, `hash`, `fastembed`).
    #[must_use]
    pub fn embedding_provider(mut self, provider: impl Into<String>) -> Self {
        self.embedding_provider = Some(provider.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the embedding base URL.
    #[must_use]
    pub fn embedding_base_url(mut self, url: impl Into<String>) -> Self {
        self.embedding_base_url = Some(url.into());
        self
    }

    /// Sets the router max tokens.
    #[must_use]
    pub const fn router_max_tokens(mut self, n: u32) -> Self {
        self.router_max_tokens = Some(n);
        self
    }

    /// Sets the responder max tokens.
    #[must_use]
    pub const fn responder_max_tokens(mut self, n: u32) -> Self {
        self.responder_max_tokens = Some(n);
        self
    }

    /// Sets the number of passages fetched per retrieval.
    #[must_use]
    pub const fn top_k(mut self, n: usize) -> Self {
        self.top_k = Some(n);
        self
    }

    /// Sets the index database path.
    #[must_use]
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Sets the subject the router treats as covered by the index.
    #[must_use]
    pub fn knowledge_domain(mut self, domain: impl Into<String>) -> Self {
        self.knowledge_domain = Some(domain.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the caller-level turn timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    fn resolve_endpoint(&self, role: ModelRole) -> Result<ModelEndpoint, AgentError> {
        let overrides = &self.roles[role.index()];
        let provider = overrides
            .provider
            .clone()
            .or_else(|| self.provider.clone())
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        if provider == "openai" && self.api_key.is_none() {
            return Err(AgentError::ApiKeyMissing {
                role: role.to_string(),
            });
        }

        Ok(ModelEndpoint {
            provider,
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| role.default_model().to_string()),
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            api_key: self.api_key.clone(),
        })
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if a role (or the embedder) uses
    /// the `openai` provider and no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let router = self.resolve_endpoint(ModelRole::Router)?;
        let retriever = self.resolve_endpoint(ModelRole::Retriever)?;
        let fast = self.resolve_endpoint(ModelRole::Fast)?;
        let deliberate = self.resolve_endpoint(ModelRole::Deliberate)?;

        let embedding_provider = self
            .embedding_provider
            .clone()
            .unwrap_or_else(|| retriever.provider.clone());
        if embedding_provider == "openai" && self.api_key.is_none() {
            return Err(AgentError::ApiKeyMissing {
                role: "embedding".to_string(),
            });
        }
        let embedding = EmbeddingConfig {
            model: self
                .embedding_model
                .clone()
                .unwrap_or_else(|| EmbeddingConfig::default_model(&embedding_provider).to_string()),
            base_url: self
                .embedding_base_url
                .clone()
                .or_else(|| retriever.base_url.clone()),
            api_key: self.api_key.clone(),
            provider: embedding_provider,
            ..EmbeddingConfig::default()
        };

        Ok(AgentConfig {
            router,
            retriever,
            fast,
            deliberate,
            embedding,
            router_max_tokens: self.router_max_tokens.unwrap_or(DEFAULT_ROUTER_MAX_TOKENS),
            retriever_max_tokens: self
                .retriever_max_tokens
                .unwrap_or(DEFAULT_RETRIEVER_MAX_TOKENS),
            responder_max_tokens: self
                .responder_max_tokens
                .unwrap_or(DEFAULT_RESPONDER_MAX_TOKENS),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K).max(1),
            index_path: self
                .index_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH)),
            knowledge_domain: self
                .knowledge_domain
                .unwrap_or_else(|| DEFAULT_KNOWLEDGE_DOMAIN.to_string()),
            prompt_dir: self.prompt_dir,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.router.provider, "ollama");
        assert_eq!(config.router.model, "llama3.1");
        assert_eq!(config.fast.model, "llama3.1");
        assert_eq!(config.deliberate.model, "deepseek-r1:8b");
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.knowledge_domain, "Kredivo");
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let result = AgentConfig::builder().provider("openai").build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing { role }) if role == "router"));
    }

    #[test]
    fn test_openai_embedding_requires_api_key() {
        let result = AgentConfig::builder().embedding_provider("openai").build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing { role }) if role == "embedding"));
    }

    #[test]
    fn test_role_overrides() {
        let config = AgentConfig::builder()
            .provider("openai")
            .api_key("key")
            .role_provider(ModelRole::Deliberate, "ollama")
            .role_base_url(ModelRole::Deliberate, "http://gpu-box:11434/v1")
            .model(ModelRole::Deliberate, "qwq")
            .model(ModelRole::Fast, "gpt-4o-mini")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.fast.provider, "openai");
        assert_eq!(config.fast.model, "gpt-4o-mini");
        assert_eq!(config.deliberate.provider, "ollama");
        assert_eq!(config.deliberate.model, "qwq");
        assert_eq!(
            config.endpoint(ModelRole::Deliberate).base_url.as_deref(),
            Some("http://gpu-box:11434/v1")
        );
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
    }

    #[test]
    fn test_top_k_never_zero() {
        let config = AgentConfig::builder()
            .top_k(0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.top_k, 1);
    }

    #[test]
    fn test_custom_values() {
        let config = AgentConfig::builder()
            .index_path("/tmp/kb.db")
            .knowledge_domain("Acme")
            .timeout(Duration::from_secs(30))
            .embedding_provider("hash")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.index_path, PathBuf::from("/tmp/kb.db"));
        assert_eq!(config.knowledge_domain, "Acme");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.embedding.provider, "hash");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(ModelRole::Deliberate.to_string(), "deliberate");
        assert_eq!(ModelRole::Router.env_prefix(), "RAG_ROUTER");
    }
}
