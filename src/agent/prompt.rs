//! Prompt templates for the router, retriever and responder.
//!
//! Templates use `{question}`, `{context}` and `{domain}` placeholders,
//! filled in by [`render`]. Each template can be overridden by a markdown
//! file in the prompt directory.

use std::path::{Path, PathBuf};

/// Router template deciding whether the knowledge base is needed.
pub const ROUTER_RETRIEVAL_PROMPT: &str = r#"# Task
You are a routing agent. Given a user question, decide whether answering it requires looking up knowledge about {domain}.
If the question asks about {domain}, answer true. Otherwise answer false.

Respond with JSON only, in exactly this shape:
{"requires_retrieval": <true|false>, "reason": "<short explanation>"}

Question: {question}
"#;

/// Router template deciding whether the question needs deliberate reasoning.
pub const ROUTER_REASONING_PROMPT: &str = r#"# Task
You are a routing agent. Given a user question, decide whether it requires careful step-by-step thinking before replying.
Puzzles, counting, arithmetic and multi-step problems need thinking. Small talk and simple lookups do not.

Respond with JSON only, in exactly this shape:
{"requires_thinking": <true|false>, "reason": "<short explanation>"}

Question: {question}
"#;

/// Retriever template producing search terms for vector search.
pub const SEARCH_TERMS_PROMPT: &str = r"# Task
You suggest search terms. Given a user question, suggest up to 3 English words that will make a vector search find the relevant documents.
Reply with the search terms only, separated by commas, and nothing else.

Question: {question}
";

/// Responder template used without retrieved context.
pub const RESPONDER_PROMPT: &str = r"# Task
You are a responder agent. Answer the user question in a fun, witty way.
Reply in the same language as the question.

Question: {question}
";

/// Responder template used with retrieved context.
pub const RESPONDER_GROUNDED_PROMPT: &str = r"# Task
You are a responder agent. Answer the user question using only the retrieved context below.
If the answer is not in the context, say that it was not found. Do not make up an answer.
Reply in the same language as the question, in a fun, witty way.

Retrieved context:
{context}

Question: {question}
";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/routed-rag/prompts";

/// Environment variable overriding the prompt directory.
pub const PROMPT_DIR_ENV: &str = "RAG_PROMPT_DIR";

const ROUTER_RETRIEVAL_FILENAME: &str = "router_retrieval.md";
const ROUTER_REASONING_FILENAME: &str = "router_reasoning.md";
const SEARCH_TERMS_FILENAME: &str = "search_terms.md";
const RESPONDER_FILENAME: &str = "responder.md";
const RESPONDER_GROUNDED_FILENAME: &str = "responder_grounded.md";

/// Templates for every model call the pipeline makes.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Router: does the question need the knowledge base?
    pub router_retrieval: String,
    /// Router: does the question need deliberate reasoning?
    pub router_reasoning: String,
    /// Retriever: search term expansion.
    pub search_terms: String,
    /// Responder without context.
    pub responder: String,
    /// Responder with retrieved context.
    pub responder_grounded: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `RAG_PROMPT_DIR` environment variable
    /// 3. `~/.config/routed-rag/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var(PROMPT_DIR_ENV).ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|content| !content.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            router_retrieval: load_file(ROUTER_RETRIEVAL_FILENAME, ROUTER_RETRIEVAL_PROMPT),
            router_reasoning: load_file(ROUTER_REASONING_FILENAME, ROUTER_REASONING_PROMPT),
            search_terms: load_file(SEARCH_TERMS_FILENAME, SEARCH_TERMS_PROMPT),
            responder: load_file(RESPONDER_FILENAME, RESPONDER_PROMPT),
            responder_grounded: load_file(RESPONDER_GROUNDED_FILENAME, RESPONDER_GROUNDED_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            router_retrieval: ROUTER_RETRIEVAL_PROMPT.to_string(),
            router_reasoning: ROUTER_REASONING_PROMPT.to_string(),
            search_terms: SEARCH_TERMS_PROMPT.to_string(),
            responder: RESPONDER_PROMPT.to_string(),
            responder_grounded: RESPONDER_GROUNDED_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (ROUTER_RETRIEVAL_FILENAME, ROUTER_RETRIEVAL_PROMPT),
            (ROUTER_REASONING_FILENAME, ROUTER_REASONING_PROMPT),
            (SEARCH_TERMS_FILENAME, SEARCH_TERMS_PROMPT),
            (RESPONDER_FILENAME, RESPONDER_PROMPT),
            (RESPONDER_GROUNDED_FILENAME, RESPONDER_GROUNDED_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Fills `{name}` placeholders in a single left-to-right pass.
///
/// Substituted values are never rescanned, so a question that itself
/// contains `{context}` is inserted verbatim. Unknown placeholders and
/// stray braces are left untouched.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out =
        String::with_capacity(template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let rendered = render(
            "Context: {context}\nQuestion: {question}",
            &[("question", "who?"), ("context", "the docs")],
        );
        assert_eq!(rendered, "Context: the docs\nQuestion: who?");
    }

    #[test]
    fn test_render_leaves_json_braces_alone() {
        let rendered = render(ROUTER_REASONING_PROMPT, &[("question", "2+2?")]);
        assert!(rendered.contains(
            r#"{"requires_thinking": <true|false>, "reason": "<short explanation>"}"#
        ));
        assert!(rendered.ends_with("Question: 2+2?\n"));
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let rendered = render(
            "{question} / {context}",
            &[("question", "what is {context}?"), ("context", "C")],
        );
        assert_eq!(rendered, "what is {context}? / C");
    }

    #[test]
    fn test_render_unclosed_brace() {
        assert_eq!(render("a { b", &[("b", "x")]), "a { b");
    }

    #[test]
    fn test_defaults_carry_placeholders() {
        let prompts = PromptSet::defaults();
        assert!(prompts.router_retrieval.contains("{domain}"));
        assert!(prompts.router_retrieval.contains("{question}"));
        assert!(prompts.search_terms.contains("up to 3"));
        assert!(prompts.responder_grounded.contains("{context}"));
        assert!(!prompts.responder.contains("{context}"));
    }

    #[test]
    fn test_load_falls_back_per_file() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(RESPONDER_FILENAME), "Custom: {question}")
            .unwrap_or_else(|_| unreachable!());
        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.responder, "Custom: {question}");
        assert_eq!(prompts.search_terms, SEARCH_TERMS_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(SEARCH_TERMS_FILENAME), "mine")
            .unwrap_or_else(|_| unreachable!());
        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(written.len(), 4);
        let kept = std::fs::read_to_string(dir.path().join(SEARCH_TERMS_FILENAME))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(kept, "mine");
    }
}
