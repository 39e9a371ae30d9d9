//! Retriever agent: query expansion followed by index lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::prompt::{PromptSet, render};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Retrieval;
use crate::error::AgentError;
use crate::index::DocumentIndex;

/// Agent that turns a question into retrieved context.
pub struct RetrieverAgent {
    provider: Arc<dyn LlmProvider>,
    index: Arc<dyn DocumentIndex>,
    template: String,
    top_k: usize,
    max_tokens: u32,
}

impl RetrieverAgent {
    /// Creates a retriever expanding queries with `provider` and searching `index`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        index: Arc<dyn DocumentIndex>,
        prompts: &PromptSet,
        top_k: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            index,
            template: prompts.search_terms.clone(),
            top_k,
            max_tokens,
        }
    }

    /// Asks the model for search terms and prepends them to the question.
    ///
    /// Returns `"<terms>, <question>"`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the model call fails.
    pub async fn expand_query(&self, question: &str) -> Result<String, AgentError> {
        let prompt = render(&self.template, &[("question", question)]);
        let response = self.execute(self.provider.as_ref(), &prompt).await?;
        let terms = response.content.trim();
        debug!(terms, "search terms suggested");
        Ok(format!("{terms}, {question}"))
    }

    /// Expands the question and fetches the top passages.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if expansion fails, or [`AgentError::Index`] if
    /// the lookup fails.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval, AgentError> {
        let search_query = self.expand_query(question).await?;
        let passages = self.index.search(&search_query, self.top_k).await?;
        debug!(
            query = %search_query,
            passages = passages.len(),
            top_k = self.top_k,
            "retrieval complete"
        );
        Ok(Retrieval::from_passages(search_query, &passages))
    }
}

#[async_trait]
impl Agent for RetrieverAgent {
    fn name(&self) -> &'static str {
        "retriever"
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
