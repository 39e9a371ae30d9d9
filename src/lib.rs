//! # routed-rag
//!
//! A question-answering pipeline that routes each question before answering
//! it. A router model decides whether the question needs the knowledge base
//! and whether it needs a slower reasoning model; a retriever expands the
//! question into a search query and fetches passages from a parent/child
//! document index; a responder answers with the chosen model, grounded in
//! the passages when there are any.
//!
//! ```text
//! question ─▶ Router ─┬─ retrieval ─▶ Retriever ─┐
//!                     └─ no retrieval ───────────┴─▶ Responder ─▶ reply
//! ```
//!
//! Model backends are [`agent::LlmProvider`] trait objects over
//! OpenAI-compatible APIs (hosted `OpenAI` or a local Ollama server); the
//! index is any [`index::DocumentIndex`], with [`index::SqliteIndex`]
//! bundled.

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod index;

pub use agent::{AgentConfig, LlmProvider, Pipeline, PromptSet};
pub use crate::core::{RouteDecision, Turn, TurnState};
pub use error::{AgentError, CommandError, Error, IndexError, Result};
pub use index::{DocumentIndex, SqliteIndex};
