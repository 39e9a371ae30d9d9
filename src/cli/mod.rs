//! CLI layer for routed-rag.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, inspecting routing, and managing the document index.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
