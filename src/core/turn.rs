//! Per-question turn state.
//!
//! A turn moves through the pipeline as a chain of owned records. Each
//! transition consumes the previous stage and adds only the fields the
//! finishing stage owns:
//!
//! ```text
//! Turn ──route()──▶ RoutedTurn ──retrieved()/skip_retrieval()──▶ PreparedTurn ──complete()──▶ TurnState
//! ```
//!
//! Nothing can overwrite a field once set, and the retrieval fields exist
//! only if the retriever actually ran.

use serde::Serialize;

use crate::error::AgentError;

/// One structured router answer for a single axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The boolean the router was asked for.
    pub flag: bool,
    /// The model's explanation.
    pub reason: String,
}

/// Router output: both classification axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    /// Whether the retriever should run.
    pub needs_retrieval: bool,
    /// Explanation for `needs_retrieval`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_retrieval_reason: Option<String>,
    /// Whether the deliberate model should answer.
    pub needs_deep_reasoning: bool,
    /// Explanation for `needs_deep_reasoning`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_deep_reasoning_reason: Option<String>,
}

impl RouteDecision {
    /// Combines the two axis verdicts.
    #[must_use]
    pub fn from_verdicts(retrieval: Verdict, reasoning: Verdict) -> Self {
        Self {
            needs_retrieval: retrieval.flag,
            needs_retrieval_reason: Some(retrieval.reason),
            needs_deep_reasoning: reasoning.flag,
            needs_deep_reasoning_reason: Some(reasoning.reason),
        }
    }

    /// The decision used when classification fails: no retrieval, fast
    /// model, no reasons.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            needs_retrieval: false,
            needs_retrieval_reason: None,
            needs_deep_reasoning: false,
            needs_deep_reasoning_reason: None,
        }
    }
}

/// Retriever output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Retrieval {
    /// Expanded query actually sent to the index.
    pub search_query: String,
    /// Matched passages, each followed by a newline.
    pub retrieved_context: String,
    /// Number of passages the index returned.
    pub passage_count: usize,
}

impl Retrieval {
    /// Builds a retrieval record from the query and the ordered passages.
    #[must_use]
    pub fn from_passages(search_query: String, passages: &[String]) -> Self {
        let mut retrieved_context = String::new();
        for passage in passages {
            retrieved_context.push_str(passage);
            retrieved_context.push('\n');
        }
        Self {
            search_query,
            retrieved_context,
            passage_count: passages.len(),
        }
    }
}

/// A fresh turn holding only the caller's question.
#[derive(Debug, Clone)]
pub struct Turn {
    question: String,
}

impl Turn {
    /// Starts a turn.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidQuestion`] for blank input.
    pub fn new(question: impl Into<String>) -> Result<Self, AgentError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(AgentError::InvalidQuestion {
                message: "question cannot be empty".to_string(),
            });
        }
        Ok(Self { question })
    }

    /// The raw question.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Records the router's decision.
    #[must_use]
    pub fn route(self, route: RouteDecision) -> RoutedTurn {
        RoutedTurn {
            question: self.question,
            route,
        }
    }
}

/// A turn the router has classified.
#[derive(Debug, Clone)]
pub struct RoutedTurn {
    question: String,
    route: RouteDecision,
}

impl RoutedTurn {
    /// The raw question.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The router's decision.
    #[must_use]
    pub const fn route(&self) -> &RouteDecision {
        &self.route
    }

    /// Records the retriever's output.
    #[must_use]
    pub fn retrieved(self, retrieval: Retrieval) -> PreparedTurn {
        PreparedTurn {
            question: self.question,
            route: self.route,
            retrieval: Some(retrieval),
        }
    }

    /// Moves on without retrieval.
    #[must_use]
    pub fn skip_retrieval(self) -> PreparedTurn {
        PreparedTurn {
            question: self.question,
            route: self.route,
            retrieval: None,
        }
    }
}

/// A turn ready for the responder.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    question: String,
    route: RouteDecision,
    retrieval: Option<Retrieval>,
}

impl PreparedTurn {
    /// The raw question.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The router's decision.
    #[must_use]
    pub const fn route(&self) -> &RouteDecision {
        &self.route
    }

    /// Retriever output, if the retriever ran.
    #[must_use]
    pub const fn retrieval(&self) -> Option<&Retrieval> {
        self.retrieval.as_ref()
    }

    /// Grounding context for the responder; empty when retrieval was skipped.
    #[must_use]
    pub fn context(&self) -> &str {
        self.retrieval
            .as_ref()
            .map_or("", |r| r.retrieved_context.as_str())
    }

    /// Records the reply and closes the turn.
    #[must_use]
    pub fn complete(self, reply: String) -> TurnState {
        TurnState {
            question: self.question,
            route: self.route,
            retrieval: self.retrieval,
            reply,
        }
    }
}

/// The finished turn record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnState {
    /// Raw user input.
    pub question: String,
    /// Router output.
    #[serde(flatten)]
    pub route: RouteDecision,
    /// Retriever output, present only if the retriever ran.
    #[serde(flatten)]
    pub retrieval: Option<Retrieval>,
    /// Final generated answer.
    pub reply: String,
}

impl TurnState {
    /// Expanded search query, empty when retrieval was skipped.
    #[must_use]
    pub fn search_query(&self) -> &str {
        self.retrieval.as_ref().map_or("", |r| r.search_query.as_str())
    }

    /// Retrieved context, empty when retrieval was skipped.
    #[must_use]
    pub fn retrieved_context(&self) -> &str {
        self.retrieval
            .as_ref()
            .map_or("", |r| r.retrieved_context.as_str())
    }
}
