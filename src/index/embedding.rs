//! Pluggable embedding backends for the document index.
//!
//! - [`OpenAiEmbedder`] talks to any `OpenAI`-compatible embeddings endpoint,
//!   which covers both hosted `OpenAI` and a local Ollama server.
//! - [`HashEmbedder`] is a deterministic feature-hashing embedder that needs
//!   no network or model files.
//! - `FastEmbedder` runs a local ONNX model (feature `fastembed-embeddings`).

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;

use crate::error::IndexError;

/// Default `OpenAI`-compatible base URL of a local Ollama server.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
/// Dimension of [`HashEmbedder`] vectors.
pub const HASH_DIMENSIONS: usize = 256;
/// Texts embedded per backend request.
const DEFAULT_BATCH_SIZE: usize = 32;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier stored alongside the index (`provider:model`).
    fn name(&self) -> String;

    /// Embeds a batch of texts, one vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] when the backend fails or returns
    /// the wrong number of vectors.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

/// Embedding backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Backend name: `"openai"`, `"ollama"`, `"hash"` or `"fastembed"`.
    pub provider: String,
    /// Backend-specific model name.
    pub model: String,
    /// Base URL override for API backends.
    pub base_url: Option<String>,
    /// API key for hosted backends.
    pub api_key: Option<String>,
    /// Texts per embedding request during ingestion.
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Default model for a backend.
    #[must_use]
    pub fn default_model(provider: &str) -> &'static str {
        match provider {
            "openai" => "text-embedding-ada-002",
            "hash" => "hash-256",
            "fastembed" => "all-MiniLM-L6-v2",
            _ => "nomic-embed-text",
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: Self::default_model("ollama").to_string(),
            base_url: None,
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Creates an [`Embedder`] based on the configured backend name.
///
/// # Errors
///
/// Returns [`IndexError::Embedding`] for unknown backends, or when the
/// `fastembed` backend is requested without the feature compiled in.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, IndexError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(
            "openai",
            &config.model,
            config.base_url.as_deref(),
            config.api_key.as_deref(),
        ))),
        "ollama" => Ok(Box::new(OpenAiEmbedder::new(
            "ollama",
            &config.model,
            Some(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL)),
            Some(config.api_key.as_deref().unwrap_or("ollama")),
        ))),
        "hash" => Ok(Box::new(HashEmbedder::new(HASH_DIMENSIONS))),
        #[cfg(feature = "fastembed-embeddings")]
        "fastembed" => Ok(Box::new(FastEmbedder::new(&config.model)?)),
        other => Err(IndexError::Embedding {
            message: format!("unsupported embedding provider: {other}"),
        }),
    }
}

/// Embedder for `OpenAI`-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    provider: &'static str,
    model: String,
}

impl OpenAiEmbedder {
    /// Creates an embedder for `model`, optionally at a custom base URL.
    #[must_use]
    pub fn new(
        provider: &'static str,
        model: &str,
        base_url: Option<&str>,
        api_key: Option<&str>,
    ) -> Self {
        let mut openai_config = OpenAIConfig::new();
        if let Some(key) = api_key {
            openai_config = openai_config.with_api_key(key);
        }
        if let Some(url) = base_url {
            openai_config = openai_config.with_api_base(url);
        }
        Self {
            client: Client::with_config(openai_config),
            provider,
            model: model.to_string(),
        }
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| IndexError::Embedding {
                message: e.to_string(),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| IndexError::Embedding {
                message: e.to_string(),
            })?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(IndexError::Embedding {
                message: format!(
                    "expected {} embeddings, backend returned {}",
                    texts.len(),
                    data.len()
                ),
            });
        }
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric terms are hashed (djb2) into a fixed number of
/// buckets weighted by term frequency, then L2-normalized. Texts sharing
/// vocabulary score high cosine similarity.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates an embedder producing `dimensions`-long vectors.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self {
            dimensions: if dimensions == 0 { 1 } else { dimensions },
        }
    }

    fn hash_term(term: &str) -> usize {
        let mut hash: usize = 5381;
        for b in term.bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(usize::from(b));
        }
        hash
    }

    /// Embeds a single text synchronously.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();
        for term in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[Self::hash_term(term) % self.dimensions] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> String {
        format!("hash:{}", self.dimensions)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Local ONNX embedder backed by `fastembed`.
#[cfg(feature = "fastembed-embeddings")]
pub struct FastEmbedder {
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
    model_name: String,
}

#[cfg(feature = "fastembed-embeddings")]
impl FastEmbedder {
    /// Loads (downloading on first use) the named model.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if the model cannot be initialized.
    pub fn new(model_name: &str) -> Result<Self, IndexError> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_enum = match model_name {
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            other => {
                tracing::warn!(model = other, "unknown fastembed model, using all-MiniLM-L6-v2");
                EmbeddingModel::AllMiniLML6V2
            }
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(model_enum).with_show_download_progress(false),
        )
        .map_err(|e| IndexError::Embedding {
            message: e.to_string(),
        })?;

        Ok(Self {
            model: std::sync::Arc::new(std::sync::Mutex::new(model)),
            model_name: model_name.to_string(),
        })
    }
}

#[cfg(feature = "fastembed-embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    fn name(&self) -> String {
        format!("fastembed:{}", self.model_name)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let model = std::sync::Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut guard = model.lock().map_err(|_| IndexError::Embedding {
                message: "embedding model lock poisoned".to_string(),
            })?;
            guard.embed(texts, None).map_err(|e| IndexError::Embedding {
                message: e.to_string(),
            })
        })
        .await
        .map_err(|e| IndexError::Embedding {
            message: e.to_string(),
        })?
    }
}

/// Cosine similarity of two vectors; `0.0` when either is all zeros or the
/// lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed_one("Who founded it?"), embedder.embed_one("who FOUNDED it"));
    }

    #[test]
    fn test_hash_embedder_normalized() {
        let v = HashEmbedder::new(64).embed_one("alpha beta gamma alpha");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let v = HashEmbedder::new(16).embed_one("   ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(HASH_DIMENSIONS);
        let query = embedder.embed_one("company founders history");
        let related = embedder.embed_one("The company was founded in 2016; its founders ...");
        let unrelated = embedder.embed_one("strawberry letters counting");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test_case(&[1.0, 0.0], &[1.0, 0.0], 1.0 ; "identical")]
    #[test_case(&[1.0, 0.0], &[0.0, 1.0], 0.0 ; "orthogonal")]
    #[test_case(&[1.0, 0.0], &[-1.0, 0.0], -1.0 ; "opposite")]
    #[test_case(&[0.0, 0.0], &[1.0, 0.0], 0.0 ; "zero vector")]
    #[test_case(&[1.0], &[1.0, 0.0], 0.0 ; "length mismatch")]
    fn test_cosine_similarity(a: &[f32], b: &[f32], expected: f32) {
        assert!((cosine_similarity(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_create_embedder() {
        let hash = EmbeddingConfig {
            provider: "hash".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&hash);
        assert!(embedder.is_ok());
        assert_eq!(
            embedder.map(|e| e.name()).unwrap_or_default(),
            "hash:256"
        );

        let ollama = create_embedder(&EmbeddingConfig::default());
        assert_eq!(
            ollama.map(|e| e.name()).unwrap_or_default(),
            "ollama:nomic-embed-text"
        );

        let unknown = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&unknown).is_err());
    }

    #[tokio::test]
    async fn test_hash_embed_batch_preserves_order() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap_or_default();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_one("one"));
        assert_eq!(vectors[1], embedder.embed_one("two"));
    }
}
