//! Error types for routed-rag.
//!
//! Errors are grouped by domain: [`AgentError`] for the model-facing
//! pipeline, [`IndexError`] for the document index and embedders, and
//! [`CommandError`] for the CLI layer. [`Error`] wraps all of them.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Pipeline or model backend failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Document index failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by agents, model providers and the pipeline driver.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A role is configured for a provider that needs an API key, and none was found.
    #[error("API key missing for {role} model (set RAG_API_KEY or OPENAI_API_KEY)")]
    ApiKeyMissing {
        /// Role whose endpoint lacks a key.
        role: String,
    },

    /// Provider name not recognized by the factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The configured provider name.
        name: String,
    },

    /// The provider request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Error description from the transport.
        message: String,
    },

    /// The model answered, but not in the expected shape.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw response content.
        content: String,
    },

    /// A streaming response broke off.
    #[error("stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// The question was rejected before any model call.
    #[error("invalid question: {message}")]
    InvalidQuestion {
        /// Why the question was rejected.
        message: String,
    },

    /// Retrieval failed after the router committed the turn to it.
    #[error("retrieval failed: {0}")]
    Index(#[from] IndexError),

    /// The caller-level turn timeout elapsed.
    #[error("turn timed out after {seconds}s")]
    Timeout {
        /// Configured timeout.
        seconds: u64,
    },
}

/// Errors raised by the document index, splitter and embedders.
#[derive(Debug, Error)]
pub enum IndexError {
    /// `SQLite` failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The embedding backend failed or returned an unusable result.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Error description.
        message: String,
    },

    /// Splitter parameters are inconsistent.
    #[error("invalid chunking parameters: {message}")]
    InvalidChunking {
        /// What is wrong with the parameters.
        message: String,
    },

    /// The query embedding does not match the dimension the index was built with.
    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch {
        /// Dimension stored in the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Nothing to ingest.
    #[error("document produced no chunks")]
    EmptyDocument,

    /// The index file or its directory could not be prepared.
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A thread panicked while holding the index connection.
    #[error("index connection lock poisoned")]
    LockPoisoned,
}

/// Errors raised while executing CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// A flag or argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_converts_to_agent_error() {
        let err: AgentError = IndexError::EmptyDocument.into();
        assert!(matches!(err, AgentError::Index(IndexError::EmptyDocument)));
        assert!(err.to_string().contains("retrieval failed"));
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::ApiKeyMissing {
            role: "router".to_string(),
        };
        assert!(err.to_string().contains("router"));

        let err = IndexError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: index has 768, query has 384"
        );
    }

    #[test]
    fn test_top_level_wraps_domains() {
        let err: Error = CommandError::InvalidArgument("bad".to_string()).into();
        assert_eq!(err.to_string(), "invalid argument: bad");
    }
}
