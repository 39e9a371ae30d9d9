//! Router agent.
//!
//! Classifies a question along two independent axes: does it need the
//! knowledge base, and does it need deliberate reasoning. Each axis is one
//! JSON-mode request; both run concurrently.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::prompt::{PromptSet, render};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::{RouteDecision, Verdict};
use crate::error::AgentError;

/// Matches a fenced code block anywhere in a response.
static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").ok());

/// Which classification a request answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAxis {
    /// Knowledge base lookup needed.
    Retrieval,
    /// Deliberate model needed.
    Reasoning,
}

impl RouteAxis {
    /// JSON key the model is asked to answer with.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Retrieval => "requires_retrieval",
            Self::Reasoning => "requires_thinking",
        }
    }
}

/// Agent that decides which path a question takes.
pub struct RouterAgent {
    provider: Arc<dyn LlmProvider>,
    retrieval_template: String,
    reasoning_template: String,
    knowledge_domain: String,
    max_tokens: u32,
}

impl RouterAgent {
    /// Creates a router over `provider`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        prompts: &PromptSet,
        knowledge_domain: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            retrieval_template: prompts.router_retrieval.clone(),
            reasoning_template: prompts.router_reasoning.clone(),
            knowledge_domain: knowledge_domain.into(),
            max_tokens,
        }
    }

    fn prompt(&self, axis: RouteAxis, question: &str) -> String {
        let template = match axis {
            RouteAxis::Retrieval => &self.retrieval_template,
            RouteAxis::Reasoning => &self.reasoning_template,
        };
        render(
            template,
            &[("question", question), ("domain", &self.knowledge_domain)],
        )
    }

    async fn ask(&self, axis: RouteAxis, question: &str) -> Result<Verdict, AgentError> {
        let response = self
            .execute(self.provider.as_ref(), &self.prompt(axis, question))
            .await?;
        debug!(
            axis = axis.key(),
            completion_tokens = response.usage.completion_tokens,
            "router verdict received"
        );
        if response.is_truncated() {
            warn!(
                axis = axis.key(),
                max_tokens = self.max_tokens,
                "router answer hit the token limit"
            );
        }
        parse_verdict(&response.content, axis)
    }

    /// Classifies `question`, failing if either axis fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`AgentError`] from either request or its parsing.
    pub async fn classify(&self, question: &str) -> Result<RouteDecision, AgentError> {
        let (retrieval, reasoning) = futures_util::join!(
            self.ask(RouteAxis::Retrieval, question),
            self.ask(RouteAxis::Reasoning, question)
        );
        Ok(RouteDecision::from_verdicts(retrieval?, reasoning?))
    }

    /// Classifies `question`, falling back to [`RouteDecision::fallback`] on
    /// any failure. Never errors.
    pub async fn route(&self, question: &str) -> RouteDecision {
        match self.classify(question).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "router classification failed, using fallback route");
                RouteDecision::fallback()
            }
        }
    }
}

#[async_trait]
impl Agent for RouterAgent {
    fn name(&self) -> &'static str {
        "router"
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Parses one router answer.
///
/// Accepts code fences, prose around the object, the axis key or a plain
/// `flag` key, and booleans written as strings or 0/1.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if no JSON object with a readable
/// flag is found.
pub fn parse_verdict(content: &str, axis: RouteAxis) -> Result<Verdict, AgentError> {
    let parse_err = |message: String| AgentError::ResponseParse {
        message,
        content: content.to_string(),
    };

    let unfenced = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map_or(content, |m| m.as_str());

    let start = unfenced
        .find('{')
        .ok_or_else(|| parse_err("no JSON object in router response".to_string()))?;
    let value = serde_json::Deserializer::from_str(&unfenced[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| parse_err("empty router response".to_string()))?
        .map_err(|e| parse_err(format!("invalid router JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| parse_err("router response is not a JSON object".to_string()))?;
    let raw_flag = object
        .get(axis.key())
        .or_else(|| object.get("flag"))
        .ok_or_else(|| parse_err(format!("missing \"{}\" in router response", axis.key())))?;
    let flag = lenient_bool(raw_flag)
        .ok_or_else(|| parse_err(format!("unreadable boolean: {raw_flag}")))?;
    let reason = match object.get("reason") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    Ok(Verdict { flag, reason })
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;
    use crate::agent::message::{ChatRequest, ChatResponse};

    #[test_case(r#"{"requires_retrieval": true, "reason": "asks about the company"}"#, true ; "plain bool")]
    #[test_case(r#"{"requires_retrieval": "false", "reason": "x"}"#, false ; "string bool")]
    #[test_case(r#"{"requires_retrieval": 1, "reason": "x"}"#, true ; "integer bool")]
    #[test_case(r#"{"flag": "Yes", "reason": "x"}"#, true ; "flag key")]
    #[test_case("```json\n{\"requires_retrieval\": true, \"reason\": \"x\"}\n```", true ; "code fence")]
    #[test_case("Sure! Here you go: {\"requires_retrieval\": false, \"reason\": \"no {braces} issue\"} Hope it helps.", false ; "surrounding prose")]
    fn test_parse_verdict_variants(content: &str, expected: bool) {
        let parsed = parse_verdict(content, RouteAxis::Retrieval);
        assert_eq!(parsed.map(|v| v.flag).ok(), Some(expected));
    }

    #[test]
    fn test_parse_verdict_reason() {
        let verdict = parse_verdict(
            r#"{"requires_thinking": false, "reason": "  simple greeting "}"#,
            RouteAxis::Reasoning,
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(verdict.reason, "simple greeting");
    }

    #[test_case("not json at all" ; "prose")]
    #[test_case("{\"reason\": \"missing flag\"}" ; "missing key")]
    #[test_case("{\"requires_thinking\": true" ; "truncated")]
    #[test_case("[true]" ; "array")]
    #[test_case(r#"{"requires_thinking": "<true|false>", "reason": "x"}"# ; "template echo")]
    fn test_parse_verdict_failures(content: &str) {
        assert!(matches!(
            parse_verdict(content, RouteAxis::Reasoning),
            Err(AgentError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_parse_verdict_ignores_other_axis_key() {
        let result = parse_verdict(
            r#"{"requires_retrieval": true, "reason": "x"}"#,
            RouteAxis::Reasoning,
        );
        assert!(result.is_err());
    }

    /// Answers each axis from a fixed table; records prompts.
    struct Scripted {
        retrieval: Result<&'static str, ()>,
        reasoning: Result<&'static str, ()>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-1"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            let prompt = request.prompt.clone();
            assert!(request.json_mode);
            assert_eq!(request.temperature, Some(0.0));
            let answer = if prompt.contains("requires_retrieval") {
                self.retrieval
            } else {
                self.reasoning
            };
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt);
            }
            answer
                .map(|content| ChatResponse {
                    content: content.to_string(),
                    ..ChatResponse::default()
                })
                .map_err(|()| AgentError::ApiRequest {
                    message: "connection refused".to_string(),
                })
        }
    }

    fn router(
        retrieval: Result<&'static str, ()>,
        reasoning: Result<&'static str, ()>,
    ) -> (RouterAgent, Arc<Scripted>) {
        let provider = Arc::new(Scripted {
            retrieval,
            reasoning,
            prompts: Mutex::new(Vec::new()),
        });
        let agent = RouterAgent::new(
            Arc::clone(&provider) as Arc<dyn LlmProvider>,
            &PromptSet::defaults(),
            "Kredivo",
            512,
        );
        (agent, provider)
    }

    #[tokio::test]
    async fn test_route_combines_both_axes() {
        let (agent, provider) = router(
            Ok(r#"{"requires_retrieval": false, "reason": "general knowledge"}"#),
            Ok(r#"{"requires_thinking": true, "reason": "counting letters"}"#),
        );
        let decision = agent.route("how many r's are in strawberry?").await;
        assert!(!decision.needs_retrieval);
        assert!(decision.needs_deep_reasoning);
        assert_eq!(decision.needs_deep_reasoning_reason.as_deref(), Some("counting letters"));

        let prompts = provider.prompts.lock().map(|p| p.clone()).unwrap_or_default();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.contains("how many r's are in strawberry?")));
        assert!(prompts.iter().any(|p| p.contains("about Kredivo")));
    }

    #[tokio::test]
    async fn test_route_falls_back_on_network_error() {
        let (agent, _) = router(
            Ok(r#"{"requires_retrieval": true, "reason": "x"}"#),
            Err(()),
        );
        assert!(agent.classify("who founded kredivo?").await.is_err());
        assert_eq!(agent.route("who founded kredivo?").await, RouteDecision::fallback());
    }

    #[tokio::test]
    async fn test_route_falls_back_on_malformed_json() {
        let (agent, _) = router(
            Ok("I cannot help with that."),
            Ok(r#"{"requires_thinking": true, "reason": "x"}"#),
        );
        let decision = agent.route("anything").await;
        assert!(!decision.needs_retrieval);
        assert!(!decision.needs_deep_reasoning);
        assert!(decision.needs_retrieval_reason.is_none());
    }
}
