//! Responder agent.
//!
//! Picks the fast or deliberate backend from the router's reasoning flag,
//! and the grounded or ungrounded template from whether context exists.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::prompt::{PromptSet, render};
use super::provider::{LlmProvider, TextStream};
use super::traits::Agent;
use crate::error::AgentError;

/// Agent that writes the final reply.
pub struct ResponderAgent {
    fast: Arc<dyn LlmProvider>,
    deliberate: Arc<dyn LlmProvider>,
    template: String,
    grounded_template: String,
    max_tokens: u32,
}

impl ResponderAgent {
    /// Creates a responder with its two backends.
    #[must_use]
    pub fn new(
        fast: Arc<dyn LlmProvider>,
        deliberate: Arc<dyn LlmProvider>,
        prompts: &PromptSet,
        max_tokens: u32,
    ) -> Self {
        Self {
            fast,
            deliberate,
            template: prompts.responder.clone(),
            grounded_template: prompts.responder_grounded.clone(),
            max_tokens,
        }
    }

    /// Backend for a turn: deliberate when deep reasoning was requested.
    #[must_use]
    pub fn select_backend(&self, deep_reasoning: bool) -> &dyn LlmProvider {
        if deep_reasoning {
            self.deliberate.as_ref()
        } else {
            self.fast.as_ref()
        }
    }

    /// Renders the reply prompt. Any non-empty context, even whitespace, is grounded.
    #[must_use]
    pub fn build_prompt(&self, question: &str, context: &str) -> String {
        if context.is_empty() {
            render(&self.template, &[("question", question)])
        } else {
            render(
                &self.grounded_template,
                &[("question", question), ("context", context)],
            )
        }
    }

    /// Generates the complete reply.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the selected backend fails.
    pub async fn reply(
        &self,
        question: &str,
        context: &str,
        deep_reasoning: bool,
    ) -> Result<String, AgentError> {
        let backend = self.select_backend(deep_reasoning);
        debug!(
            backend = backend.name(),
            model = backend.model(),
            grounded = !context.is_empty(),
            "generating reply"
        );
        let response = self
            .execute(backend, &self.build_prompt(question, context))
            .await?;
        if response.is_truncated() {
            warn!(
                model = backend.model(),
                max_tokens = self.max_tokens,
                "reply cut off at the token limit"
            );
        }
        Ok(response.content)
    }

    /// Generates the reply as a stream of fragments.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the stream cannot be opened.
    pub async fn reply_stream(
        &self,
        question: &str,
        context: &str,
        deep_reasoning: bool,
    ) -> Result<TextStream, AgentError> {
        let backend = self.select_backend(deep_reasoning);
        debug!(
            backend = backend.name(),
            model = backend.model(),
            grounded = !context.is_empty(),
            "streaming reply"
        );
        self.execute_stream(backend, &self.build_prompt(question, context))
            .await
    }
}

#[async_trait]
impl Agent for ResponderAgent {
    fn name(&self) -> &'static str {
        "responder"
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse};

    /// Replies with its model name and the prompt it received.
    struct Named(&'static str);

    #[async_trait]
    impl LlmProvider for Named {
        fn name(&self) -> &'static str {
            "named"
        }

        fn model(&self) -> &str {
            self.0
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: format!("[{}] {}", self.0, request.prompt),
                ..ChatResponse::default()
            })
        }
    }

    fn responder() -> ResponderAgent {
        ResponderAgent::new(
            Arc::new(Named("fast")),
            Arc::new(Named("deliberate")),
            &PromptSet::defaults(),
            4096,
        )
    }

    #[test]
    fn test_select_backend_follows_flag() {
        let agent = responder();
        assert_eq!(agent.select_backend(false).model(), "fast");
        assert_eq!(agent.select_backend(true).model(), "deliberate");
    }

    #[test]
    fn test_build_prompt_grounded_only_with_context() {
        let agent = responder();
        let ungrounded = agent.build_prompt("hi?", "");
        assert!(ungrounded.contains("Question: hi?"));
        assert!(!ungrounded.contains("Retrieved context"));

        let blank = agent.build_prompt("hi?", " \n");
        assert!(blank.contains("Retrieved context:\n \n"));

        let grounded = agent.build_prompt("who?", "Founded in 2016.\n");
        assert!(grounded.contains("Retrieved context:\nFounded in 2016.\n"));
        assert!(grounded.contains("Question: who?"));
    }

    #[test]
    fn test_build_prompt_does_not_expand_user_braces() {
        let agent = responder();
        let prompt = agent.build_prompt("what is {context}?", "");
        assert!(prompt.contains("Question: what is {context}?"));
    }

    #[tokio::test]
    async fn test_reply_uses_selected_model() {
        let agent = responder();
        let reply = agent.reply("q", "", true).await.unwrap_or_default();
        assert!(reply.starts_with("[deliberate]"));
        let reply = agent.reply("q", "", false).await.unwrap_or_default();
        assert!(reply.starts_with("[fast]"));
    }

    #[tokio::test]
    async fn test_reply_stream_matches_reply() {
        let agent = responder();
        let whole = agent.reply("q", "ctx", false).await.unwrap_or_default();
        let fragments: Vec<String> = match agent.reply_stream("q", "ctx", false).await {
            Ok(stream) => stream.filter_map(|r| async move { r.ok() }).collect().await,
            Err(_) => unreachable!(),
        };
        assert_eq!(fragments.concat(), whole);
    }
}
