//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::index::chunking::{
    DEFAULT_CHILD_OVERLAP, DEFAULT_CHILD_SIZE, DEFAULT_PARENT_OVERLAP, DEFAULT_PARENT_SIZE,
};

/// routed-rag: route each question to the right model, with retrieval when it helps.
///
/// A router decides whether a question needs the knowledge base and whether
/// it needs a reasoning model; the responder answers accordingly.
#[derive(Parser, Debug)]
#[command(name = "routed-rag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the document index database.
    ///
    /// Defaults to `knowledge_base/index.db` in the current directory.
    #[arg(short, long, env = "RAG_INDEX_PATH", global = true)]
    pub index_path: Option<PathBuf>,

    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one question.
    ///
    /// Routes the question, retrieves context if the router asks for it,
    /// and prints the reply followed by a route summary.
    #[command(after_help = r#"Examples:
  routed-rag ask "who founded kredivo?"
  routed-rag ask "how many r's are in strawberry?" --stream
  routed-rag --format json ask "what products are offered?" | jq .needs_retrieval
"#)]
    Ask {
        /// The question.
        question: String,

        /// Print the reply as it is generated.
        #[arg(short, long)]
        stream: bool,

        /// Abort the turn after this many seconds.
        #[arg(short, long, env = "RAG_TIMEOUT_SECS")]
        timeout: Option<u64>,
    },

    /// Answer questions read line by line from stdin.
    ///
    /// Each line is an independent turn; there is no conversation history.
    Chat {
        /// Abort a turn after this many seconds.
        #[arg(short, long, env = "RAG_TIMEOUT_SECS")]
        timeout: Option<u64>,
    },

    /// Run only the router and print its decision.
    Route {
        /// The question to classify.
        question: String,
    },

    /// Search the document index directly, without query expansion.
    #[command(after_help = r#"Examples:
  routed-rag search "kredivo founders"
  routed-rag search "credit limit" -k 5
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Maximum number of passages.
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,
    },

    /// Split, embed and store text files in the index.
    ///
    /// Accepts files and directories; directories are walked for `.txt`
    /// and `.md` files.
    #[command(after_help = r#"Examples:
  routed-rag ingest docs/
  routed-rag ingest faq.md about.txt --child-size 200
"#)]
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Parent chunk size in characters.
        #[arg(long, default_value_t = DEFAULT_PARENT_SIZE)]
        parent_size: usize,

        /// Overlap between parent chunks in characters.
        #[arg(long, default_value_t = DEFAULT_PARENT_OVERLAP)]
        parent_overlap: usize,

        /// Child chunk size in characters.
        #[arg(long, default_value_t = DEFAULT_CHILD_SIZE)]
        child_size: usize,

        /// Overlap between child chunks in characters.
        #[arg(long, default_value_t = DEFAULT_CHILD_OVERLAP)]
        child_overlap: usize,
    },

    /// Show index contents and the embedder it was built with.
    Status,

    /// Write the default prompt templates for editing.
    ///
    /// Existing files are left untouched.
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/routed-rag/prompts/`.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}
