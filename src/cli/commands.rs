//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands return the
//! text to print; streaming commands also write fragments to stdout as
//! they arrive.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::agent::{AgentConfig, Pipeline, PromptSet};
use crate::cli::output::{
    OutputFormat, format_ingest, format_passages, format_route, format_status, format_turn,
    route_summary,
};
use crate::cli::parser::{Cli, Commands};
use crate::core::TurnState;
use crate::error::{AgentError, CommandError, Result};
use crate::index::{ChunkingConfig, DocumentIndex, IngestReport, SqliteIndex, create_embedder};

/// File extensions picked up when ingesting a directory.
const INGEST_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Parameters for the ingest command.
#[derive(Debug, Clone)]
pub struct IngestParams<'a> {
    /// Files or directories to ingest.
    pub paths: &'a [PathBuf],
    /// Parent chunk size in characters.
    pub parent_size: usize,
    /// Parent chunk overlap in characters.
    pub parent_overlap: usize,
    /// Child chunk size in characters.
    pub child_size: usize,
    /// Child chunk overlap in characters.
    pub child_overlap: usize,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask {
            question,
            stream,
            timeout,
        } => cmd_ask(cli, question, *stream, *timeout, format),
        Commands::Chat { timeout } => cmd_chat(cli, *timeout, format),
        Commands::Route { question } => cmd_route(cli, question, format),
        Commands::Search { query, top_k } => cmd_search(cli, query, *top_k, format),
        Commands::Ingest {
            paths,
            parent_size,
            parent_overlap,
            child_size,
            child_overlap,
        } => cmd_ingest(
            cli,
            &IngestParams {
                paths,
                parent_size: *parent_size,
                parent_overlap: *parent_overlap,
                child_size: *child_size,
                child_overlap: *child_overlap,
            },
            format,
        ),
        Commands::Status => cmd_status(cli, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Resolves configuration from the environment plus CLI overrides.
fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(ref path) = cli.index_path {
        builder = builder.index_path(path);
    }
    builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Configuration error: {e}")).into()
    })
}

fn open_index(config: &AgentConfig) -> Result<SqliteIndex> {
    let embedder = create_embedder(&config.embedding)?;
    debug!(
        path = %config.index_path.display(),
        embedder = %embedder.name(),
        "opening index"
    );
    Ok(SqliteIndex::open(&config.index_path, embedder)?
        .with_batch_size(config.embedding.batch_size))
}

fn build_pipeline(config: &AgentConfig) -> Result<Pipeline> {
    let index: Arc<dyn DocumentIndex> = Arc::new(open_index(config)?);
    Ok(Pipeline::from_config(config, index)?)
}

/// Creates the tokio runtime bridging sync commands to async agents.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Runs `fut`, failing with [`AgentError::Timeout`] if `limit` elapses first.
async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> std::result::Result<T, AgentError>
where
    F: Future<Output = std::result::Result<T, AgentError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AgentError::Timeout {
                seconds: limit.as_secs(),
            })?,
        None => fut.await,
    }
}

fn turn_limit(flag: Option<u64>, config: &AgentConfig) -> Option<Duration> {
    flag.map(Duration::from_secs).or(config.timeout)
}

fn write_fragment(out: &mut impl Write, fragment: &str) -> std::result::Result<(), AgentError> {
    out.write_all(fragment.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| AgentError::Stream {
            message: format!("failed to write reply: {e}"),
        })
}

/// Writes a finished turn as one NDJSON line.
fn write_turn_line(out: &mut impl Write, state: &TurnState) -> std::result::Result<(), AgentError> {
    let line = OutputFormat::Ndjson.to_json(state) + "\n";
    write_fragment(out, &line)
}

/// Runs one streamed turn, echoing fragments to `out`.
async fn stream_turn(
    pipeline: &Pipeline,
    question: &str,
    out: &mut (impl Write + Send),
) -> std::result::Result<TurnState, AgentError> {
    let streaming = pipeline.run_streaming(question).await?;
    let state = streaming
        .finish(|fragment| write_fragment(&mut *out, fragment))
        .await?;
    write_fragment(out, "\n")?;
    Ok(state)
}

fn cmd_ask(
    cli: &Cli,
    question: &str,
    stream: bool,
    timeout: Option<u64>,
    format: OutputFormat,
) -> Result<String> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(&config)?;
    let limit = turn_limit(timeout, &config);
    let rt = runtime()?;

    if stream && !format.is_json() {
        let state = rt.block_on(with_timeout(limit, async {
            let mut stdout = io::stdout();
            stream_turn(&pipeline, question, &mut stdout).await
        }))?;
        return Ok(format!("\n{}\n", route_summary(&state)));
    }

    let state = rt.block_on(with_timeout(limit, pipeline.run(question)))?;
    Ok(format_turn(&state, format))
}

fn cmd_chat(cli: &Cli, timeout: Option<u64>, format: OutputFormat) -> Result<String> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(&config)?;
    let limit = turn_limit(timeout, &config);
    let rt = runtime()?;

    let mut turns = 0_usize;
    let mut failures = 0_usize;
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        turns += 1;

        let result = if format.is_json() {
            rt.block_on(with_timeout(limit, pipeline.run(question)))
                .and_then(|state| write_turn_line(&mut io::stdout(), &state))
        } else {
            rt.block_on(with_timeout(limit, async {
                let mut stdout = io::stdout();
                stream_turn(&pipeline, question, &mut stdout).await
            }))
            .map(|_| ())
        };

        if let Err(e) = result {
            failures += 1;
            warn!(error = %e, "turn failed");
            write_fragment(&mut io::stderr(), &format!("Error: {e}\n"))?;
        }
    }

    if format.is_json() {
        Ok(String::new())
    } else {
        Ok(format!("\n{turns} question(s), {failures} failed\n"))
    }
}

fn cmd_route(cli: &Cli, question: &str, format: OutputFormat) -> Result<String> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(&config)?;
    let turn = crate::core::Turn::new(question)?;
    let rt = runtime()?;
    let decision = rt.block_on(pipeline.router().route(turn.question()));
    Ok(format_route(&decision, format))
}

fn cmd_search(cli: &Cli, query: &str, top_k: usize, format: OutputFormat) -> Result<String> {
    if query.trim().is_empty() {
        return Err(
            CommandError::InvalidArgument("search query cannot be empty".to_string()).into(),
        );
    }
    let config = load_config(cli)?;
    let index = open_index(&config)?;
    let rt = runtime()?;
    let passages = rt.block_on(index.search(query, top_k))?;
    Ok(format_passages(query, &passages, format))
}

/// Expands files and directories into the text files to ingest, sorted.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, files)?;
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| INGEST_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            walk(path, &mut found)?;
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            return Err(CommandError::InvalidArgument(format!(
                "no such file or directory: {}",
                path.display()
            ))
            .into());
        }
    }
    Ok(files)
}

fn cmd_ingest(cli: &Cli, params: &IngestParams<'_>, format: OutputFormat) -> Result<String> {
    let chunking = ChunkingConfig::new(
        params.parent_size,
        params.parent_overlap,
        params.child_size,
        params.child_overlap,
    )?;
    let files = collect_files(params.paths)?;
    if files.is_empty() {
        return Err(CommandError::InvalidArgument(
            "no .txt or .md files found in the given paths".to_string(),
        )
        .into());
    }

    let config = load_config(cli)?;
    let index = open_index(&config)?;
    let rt = runtime()?;

    let mut reports: Vec<IngestReport> = Vec::with_capacity(files.len());
    for file in &files {
        let text = std::fs::read_to_string(file)?;
        let source = file.display().to_string();
        match rt.block_on(index.add_document(&source, &text, &chunking)) {
            Ok(report) => reports.push(report),
            Err(crate::error::IndexError::EmptyDocument) => {
                warn!(source = %source, "skipping empty document");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(format_ingest(&reports, format))
}

fn cmd_status(cli: &Cli, format: OutputFormat) -> Result<String> {
    let config = load_config(cli)?;
    let index = open_index(&config)?;
    let stats = index.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    if format.is_json() {
        let json = serde_json::json!({
            "directory": target_dir.to_string_lossy(),
            "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
            "count": written.len()
        });
        return Ok(format.to_json(&json));
    }

    if written.is_empty() {
        return Ok(format!(
            "All prompt templates already exist in: {}\n",
            target_dir.display()
        ));
    }
    let mut output = format!(
        "Wrote {} prompt template(s) to: {}\n",
        written.len(),
        target_dir.display()
    );
    for path in &written {
        output.push_str("  ");
        output.push_str(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown"),
        );
        output.push('\n');
    }
    output.push_str(
        "\nEdit these files to customize the router, retriever and responder prompts.\n",
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap_or_else(|_| unreachable!());
        for name in ["b.md", "a.txt", "skip.pdf"] {
            std::fs::write(dir.path().join(name), "x").unwrap_or_else(|_| unreachable!());
        }
        std::fs::write(nested.join("c.TXT"), "x").unwrap_or_else(|_| unreachable!());

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap_or_default();
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.TXT"]);
    }

    #[test]
    fn test_collect_files_missing_path() {
        let result = collect_files(&[PathBuf::from("/definitely/not/here")]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: std::result::Result<(), AgentError> =
            with_timeout(Some(Duration::from_millis(10)), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AgentError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout(None, async { Ok::<_, AgentError>(7) }).await;
        assert_eq!(result.ok(), Some(7));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn finished_turn() -> TurnState {
        crate::core::Turn::new("hi")
            .unwrap_or_else(|_| unreachable!())
            .route(crate::core::RouteDecision::fallback())
            .skip_retrieval()
            .complete("hello".to_string())
    }

    #[test]
    fn test_write_turn_line_is_one_json_line() {
        let mut out = Vec::new();
        write_turn_line(&mut out, &finished_turn()).unwrap_or_else(|_| unreachable!());
        let text = String::from_utf8(out).unwrap_or_default();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"reply\":\"hello\""));
    }

    #[test]
    fn test_write_turn_line_reports_broken_pipe() {
        let result = write_turn_line(&mut BrokenPipe, &finished_turn());
        assert!(matches!(result, Err(AgentError::Stream { .. })));
        let result = write_fragment(&mut BrokenPipe, "partial");
        assert!(matches!(result, Err(AgentError::Stream { .. })));
    }

    #[test]
    fn test_init_prompts_writes_then_skips() {
        let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let first = cmd_init_prompts(Some(dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(first.starts_with("Wrote 5 prompt template(s)"));
        let second = cmd_init_prompts(Some(dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(second.starts_with("All prompt templates already exist"));
    }
}
