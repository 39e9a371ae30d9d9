//! Output formatting for CLI commands.
//!
//! Text output is for humans; JSON and NDJSON carry the same records for
//! scripts.

use std::fmt::Write;

use serde::Serialize;

use crate::core::{RouteDecision, TurnState};
use crate::index::{IndexStats, IngestReport};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One compact JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognized is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavor.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Json | Self::Text => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    /// Whether this is a JSON flavor.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::Ndjson)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// One-line summary of which path a turn took.
#[must_use]
pub fn route_summary(state: &TurnState) -> String {
    let mut line = format!(
        "---\nRetrieval: {} | Deep reasoning: {}",
        yes_no(state.route.needs_retrieval),
        yes_no(state.route.needs_deep_reasoning)
    );
    if let Some(retrieval) = &state.retrieval {
        let _ = write!(
            line,
            " | Passages: {} | Query: {}",
            retrieval.passage_count, retrieval.search_query
        );
    }
    line
}

/// Formats a completed turn.
#[must_use]
pub fn format_turn(state: &TurnState, format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(state);
    }
    format!("{}\n\n{}\n", state.reply.trim_end(), route_summary(state))
}

/// Formats a router decision.
#[must_use]
pub fn format_route(decision: &RouteDecision, format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(decision);
    }
    let mut output = String::new();
    let _ = writeln!(output, "Retrieval:      {}", yes_no(decision.needs_retrieval));
    if let Some(reason) = &decision.needs_retrieval_reason {
        let _ = writeln!(output, "  reason: {reason}");
    }
    let _ = writeln!(
        output,
        "Deep reasoning: {}",
        yes_no(decision.needs_deep_reasoning)
    );
    if let Some(reason) = &decision.needs_deep_reasoning_reason {
        let _ = writeln!(output, "  reason: {reason}");
    }
    output
}

/// Formats search hits.
#[must_use]
pub fn format_passages(query: &str, passages: &[String], format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(&serde_json::json!({
            "query": query,
            "count": passages.len(),
            "passages": passages,
        }));
    }
    if passages.is_empty() {
        return format!("No passages found for: {query}\n");
    }
    let mut output = format!("{} passage(s) for: {query}\n", passages.len());
    for (i, passage) in passages.iter().enumerate() {
        let _ = write!(output, "\n[{}]\n{}\n", i + 1, passage.trim_end());
    }
    output
}

/// Formats ingestion results.
#[must_use]
pub fn format_ingest(reports: &[IngestReport], format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(&reports);
    }
    let mut output = String::new();
    for report in reports {
        let _ = writeln!(
            output,
            "Ingested {}: {} parent(s), {} child chunk(s)",
            report.source, report.parents, report.children
        );
    }
    let parents: usize = reports.iter().map(|r| r.parents).sum();
    let children: usize = reports.iter().map(|r| r.children).sum();
    let _ = writeln!(
        output,
        "Total: {} document(s), {parents} parent(s), {children} child chunk(s)",
        reports.len()
    );
    output
}

/// Formats index statistics.
#[must_use]
pub fn format_status(stats: &IndexStats, format: OutputFormat) -> String {
    if format.is_json() {
        return format.to_json(stats);
    }
    let mut output = String::new();
    let _ = writeln!(output, "Documents: {}", stats.documents);
    let _ = writeln!(output, "Parents:   {}", stats.parents);
    let _ = writeln!(output, "Children:  {}", stats.children);
    let _ = writeln!(
        output,
        "Embedder:  {}",
        stats.embedder.as_deref().unwrap_or("(none yet)")
    );
    if let Some(dimensions) = stats.dimensions {
        let _ = writeln!(output, "Dimension: {dimensions}");
    }
    output
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::core::{Retrieval, Turn};

    #[test_case("json", OutputFormat::Json)]
    #[test_case("NDJSON", OutputFormat::Ndjson)]
    #[test_case("text", OutputFormat::Text)]
    #[test_case("yaml", OutputFormat::Text)]
    fn test_parse(input: &str, expected: OutputFormat) {
        assert_eq!(OutputFormat::parse(input), expected);
    }

    fn grounded_turn() -> TurnState {
        Turn::new("who founded kredivo?")
            .unwrap_or_else(|_| unreachable!())
            .route(RouteDecision {
                needs_retrieval: true,
                needs_retrieval_reason: Some("about the company".to_string()),
                needs_deep_reasoning: false,
                needs_deep_reasoning_reason: Some("simple lookup".to_string()),
            })
            .retrieved(Retrieval::from_passages(
                "founder, kredivo, history, who founded kredivo?".to_string(),
                &["Kredivo was founded by ...".to_string()],
            ))
            .complete("Akshay Garg and Umang Rustagi!\n".to_string())
    }

    #[test]
    fn test_format_turn_text() {
        let text = format_turn(&grounded_turn(), OutputFormat::Text);
        assert!(text.starts_with("Akshay Garg and Umang Rustagi!\n\n---\n"));
        assert!(text.contains("Retrieval: yes | Deep reasoning: no | Passages: 1"));
    }

    #[test]
    fn test_format_turn_ndjson_is_one_line() {
        let json = format_turn(&grounded_turn(), OutputFormat::Ndjson);
        assert!(!json.contains('\n'));
        let value: serde_json::Value =
            serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["needs_retrieval"], true);
        assert_eq!(
            value["search_query"],
            "founder, kredivo, history, who founded kredivo?"
        );
    }

    #[test]
    fn test_format_route_fallback_has_no_reasons() {
        let text = format_route(&RouteDecision::fallback(), OutputFormat::Text);
        assert!(text.contains("Retrieval:      no"));
        assert!(!text.contains("reason"));
    }

    #[test]
    fn test_format_passages_empty() {
        let text = format_passages("nothing", &[], OutputFormat::Text);
        assert_eq!(text, "No passages found for: nothing\n");
    }
}
