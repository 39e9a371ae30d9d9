//! Per-question pipeline driver.
//!
//! Runs Router → (Retriever, if routed) → Responder for one question and
//! returns the completed [`TurnState`].

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tracing::{debug, info};

use super::client::create_provider;
use super::config::{AgentConfig, ModelRole};
use super::prompt::PromptSet;
use super::provider::TextStream;
use super::responder::ResponderAgent;
use super::retriever::RetrieverAgent;
use super::router::RouterAgent;
use crate::core::{PreparedTurn, Turn, TurnState};
use crate::error::AgentError;
use crate::index::DocumentIndex;

/// The three agents, constructed once and shared across questions.
pub struct Pipeline {
    router: RouterAgent,
    retriever: RetrieverAgent,
    responder: ResponderAgent,
}

/// A turn whose reply is still being generated.
pub struct StreamingTurn {
    /// Everything decided before the reply.
    pub turn: PreparedTurn,
    /// Reply fragments in generation order.
    pub reply: TextStream,
}

impl StreamingTurn {
    /// Drains the stream, calling `on_fragment` for each piece, and returns
    /// the completed turn.
    ///
    /// # Errors
    ///
    /// Returns the first stream error, or the first error from `on_fragment`.
    pub async fn finish<F>(mut self, mut on_fragment: F) -> Result<TurnState, AgentError>
    where
        F: FnMut(&str) -> Result<(), AgentError> + Send,
    {
        let mut reply = String::new();
        while let Some(fragment) = self.reply.next().await {
            let fragment = fragment?;
            on_fragment(&fragment)?;
            reply.push_str(&fragment);
        }
        Ok(self.turn.complete(reply))
    }
}

impl Pipeline {
    /// Assembles a pipeline from ready-made agents.
    #[must_use]
    pub const fn new(
        router: RouterAgent,
        retriever: RetrieverAgent,
        responder: ResponderAgent,
    ) -> Self {
        Self {
            router,
            retriever,
            responder,
        }
    }

    /// Builds every agent from configuration.
    ///
    /// Prompts are loaded from [`AgentConfig::prompt_dir`], falling back to
    /// compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] if a role names an unknown
    /// provider.
    pub fn from_config(
        config: &AgentConfig,
        index: Arc<dyn DocumentIndex>,
    ) -> Result<Self, AgentError> {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(config, index, &prompts)
    }

    /// Builds every agent from configuration with explicit prompts.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] if a role names an unknown
    /// provider.
    pub fn with_prompts(
        config: &AgentConfig,
        index: Arc<dyn DocumentIndex>,
        prompts: &PromptSet,
    ) -> Result<Self, AgentError> {
        let router = RouterAgent::new(
            create_provider(config.endpoint(ModelRole::Router))?,
            prompts,
            config.knowledge_domain.clone(),
            config.router_max_tokens,
        );
        let retriever = RetrieverAgent::new(
            create_provider(config.endpoint(ModelRole::Retriever))?,
            index,
            prompts,
            config.top_k,
            config.retriever_max_tokens,
        );
        let responder = ResponderAgent::new(
            create_provider(config.endpoint(ModelRole::Fast))?,
            create_provider(config.endpoint(ModelRole::Deliberate))?,
            prompts,
            config.responder_max_tokens,
        );
        Ok(Self::new(router, retriever, responder))
    }

    /// The router, for classification-only callers.
    #[must_use]
    pub const fn router(&self) -> &RouterAgent {
        &self.router
    }

    /// Routes the question and, if routed there, retrieves context.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidQuestion`] for blank input,
    /// or any retrieval error. Router failures never surface.
    pub async fn prepare(&self, question: &str) -> Result<PreparedTurn, AgentError> {
        let turn = Turn::new(question)?;
        let decision = self.router.route(turn.question()).await;
        info!(
            needs_retrieval = decision.needs_retrieval,
            needs_deep_reasoning = decision.needs_deep_reasoning,
            "route decided"
        );

        let routed = turn.route(decision);
        if routed.route().needs_retrieval {
            let retrieval = self.retriever.retrieve(routed.question()).await?;
            info!(passages = retrieval.passage_count, "context retrieved");
            Ok(routed.retrieved(retrieval))
        } else {
            debug!("retrieval skipped");
            Ok(routed.skip_retrieval())
        }
    }

    /// Runs one complete turn.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] from validation, retrieval or the responder.
    pub async fn run(&self, question: &str) -> Result<TurnState, AgentError> {
        let start = Instant::now();
        let prepared = self.prepare(question).await?;
        let reply = self
            .responder
            .reply(
                prepared.question(),
                prepared.context(),
                prepared.route().needs_deep_reasoning,
            )
            .await?;
        debug!(
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            reply_len = reply.len(),
            "turn complete"
        );
        Ok(prepared.complete(reply))
    }

    /// Runs one turn with a streamed reply.
    ///
    /// Routing and retrieval finish before this returns; the reply is
    /// generated as the returned stream is polled.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] from validation, retrieval, or opening the stream.
    pub async fn run_streaming(&self, question: &str) -> Result<StreamingTurn, AgentError> {
        let turn = self.prepare(question).await?;
        let reply = self
            .responder
            .reply_stream(
                turn.question(),
                turn.context(),
                turn.route().needs_deep_reasoning,
            )
            .await?;
        Ok(StreamingTurn { turn, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{HashEmbedder, SqliteIndex};

    #[test]
    fn test_from_config_with_default_endpoints() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        let index = SqliteIndex::in_memory(Box::new(HashEmbedder::new(16)))
            .unwrap_or_else(|_| unreachable!());
        assert!(Pipeline::from_config(&config, Arc::new(index)).is_ok());
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let config = AgentConfig::builder()
            .role_provider(ModelRole::Deliberate, "anthropic")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let index = SqliteIndex::in_memory(Box::new(HashEmbedder::new(16)))
            .unwrap_or_else(|_| unreachable!());
        let result = Pipeline::from_config(&config, Arc::new(index));
        assert!(
            matches!(result, Err(AgentError::UnsupportedProvider { name }) if name == "anthropic")
        );
    }
}
