//! Routed question answering.
//!
//! Each question passes through up to three agents backed by pluggable
//! providers over OpenAI-compatible APIs (hosted `OpenAI` or local Ollama).
//!
//! # Architecture
//!
//! ```text
//! Question → Pipeline
//!   ├── RouterAgent (two concurrent JSON classifications)
//!   │     needs_retrieval? ── no ──────────────────────┐
//!   │          │ yes                                   │
//!   ├── RetrieverAgent (search terms → index lookup)   │
//!   │          │                                       │
//!   └── ResponderAgent ◀───────────────────────────────┘
//!         fast or deliberate model, grounded or plain prompt
//! ```

pub mod client;
pub mod config;
pub mod message;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod responder;
pub mod retriever;
pub mod router;
pub mod traits;

// Re-export key types
pub use client::create_provider;
pub use config::{AgentConfig, ModelEndpoint, ModelRole};
pub use message::{ChatRequest, ChatResponse, TokenUsage};
pub use pipeline::{Pipeline, StreamingTurn};
pub use prompt::PromptSet;
pub use provider::{LlmProvider, TextStream};
pub use responder::ResponderAgent;
pub use retriever::RetrieverAgent;
pub use router::{RouteAxis, RouterAgent, parse_verdict};
pub use traits::{Agent, AgentResponse};
