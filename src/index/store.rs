//! `SQLite`-backed parent/child document index.
//!
//! Documents are split into large parent chunks, and each parent into small
//! child chunks. Only children are embedded and searched; a matching child
//! resolves to its parent, whose text is returned as the passage.
//!
//! Embeddings are stored as little-endian `f32` BLOBs and scored by brute
//! force cosine similarity.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rayon::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use super::DocumentIndex;
use super::chunking::TextSplitter;
use super::embedding::{Embedder, cosine_similarity};
use crate::error::IndexError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
CREATE TABLE IF NOT EXISTS parents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    content TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS children (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER NOT NULL REFERENCES parents(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_children_parent ON children(parent_id);
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Parent and child splitter settings used during ingestion.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Splits documents into parents.
    pub parent: TextSplitter,
    /// Splits parents into children.
    pub child: TextSplitter,
}

impl ChunkingConfig {
    /// Creates a configuration from raw sizes.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidChunking`] if either splitter is invalid or
    /// children would not be smaller than parents.
    pub fn new(
        parent_size: usize,
        parent_overlap: usize,
        child_size: usize,
        child_overlap: usize,
    ) -> Result<Self, IndexError> {
        let parent = TextSplitter::new(parent_size, parent_overlap)?;
        let child = TextSplitter::new(child_size, child_overlap)?;
        if child.chunk_size() > parent.chunk_size() {
            return Err(IndexError::InvalidChunking {
                message: format!(
                    "child size ({}) must not exceed parent size ({})",
                    child.chunk_size(),
                    parent.chunk_size()
                ),
            });
        }
        Ok(Self { parent, child })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            parent: TextSplitter::default_parent(),
            child: TextSplitter::default_child(),
        }
    }
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Row ID of the new document.
    pub document_id: i64,
    /// Source label.
    pub source: String,
    /// Parent chunks stored.
    pub parents: usize,
    /// Child chunks embedded and stored.
    pub children: usize,
}

/// Index contents summary.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Documents ingested.
    pub documents: usize,
    /// Parent chunks stored.
    pub parents: usize,
    /// Child chunks stored.
    pub children: usize,
    /// Embedder the index was built with, if any.
    pub embedder: Option<String>,
    /// Embedding dimension, if any.
    pub dimensions: Option<usize>,
}

/// Parent/child document index in a single `SQLite` file.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

impl SqliteIndex {
    /// Opens (creating if needed) the index at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path, embedder: Box<dyn Embedder>) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?, embedder)
    }

    /// Creates an index in memory.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] if the schema cannot be created.
    pub fn in_memory(embedder: Box<dyn Embedder>) -> Result<Self, IndexError> {
        Self::with_connection(Connection::open_in_memory()?, embedder)
    }

    fn with_connection(conn: Connection, embedder: Box<dyn Embedder>) -> Result<Self, IndexError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            batch_size: 32,
        })
    }

    /// Sets how many child chunks are embedded per backend request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::LockPoisoned)
    }

    fn meta(conn: &Connection, key: &str) -> Result<Option<String>, IndexError> {
        Ok(conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn stored_dimensions(conn: &Connection) -> Result<Option<usize>, IndexError> {
        Ok(Self::meta(conn, "dimensions")?.and_then(|v| v.parse().ok()))
    }

    /// Splits, embeds and stores one document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyDocument`] if the text yields no chunks,
    /// [`IndexError::Embedding`] on embedding failure, and
    /// [`IndexError::DimensionMismatch`] if the embedder disagrees with the
    /// dimension the index was built with.
    pub async fn add_document(
        &self,
        source: &str,
        text: &str,
        chunking: &ChunkingConfig,
    ) -> Result<IngestReport, IndexError> {
        let parents = chunking.parent.split(text);
        let families: Vec<(String, Vec<String>)> = parents
            .into_iter()
            .map(|parent| {
                let children = chunking.child.split(&parent);
                (parent, children)
            })
            .filter(|(_, children)| !children.is_empty())
            .collect();

        let child_texts: Vec<String> = families
            .iter()
            .flat_map(|(_, children)| children.iter().cloned())
            .collect();
        if child_texts.is_empty() {
            return Err(IndexError::EmptyDocument);
        }

        let mut embeddings = Vec::with_capacity(child_texts.len());
        for batch in child_texts.chunks(self.batch_size) {
            let vectors = self.embedder.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(IndexError::Embedding {
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                });
            }
            embeddings.extend(vectors);
        }
        let dimensions = embeddings.first().map_or(0, Vec::len);
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }
        debug!(
            source,
            parents = families.len(),
            children = child_texts.len(),
            dimensions,
            "embedded document"
        );

        let mut conn = self.lock()?;
        if let Some(expected) = Self::stored_dimensions(&conn)?
            && expected != dimensions
        {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: dimensions,
            });
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('embedder', ?1)",
            params![self.embedder.name()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dimensions', ?1)",
            params![dimensions.to_string()],
        )?;
        tx.execute("INSERT INTO documents (source) VALUES (?1)", params![source])?;
        let document_id = tx.last_insert_rowid();

        let mut vectors = embeddings.into_iter();
        for (position, (parent, children)) in families.iter().enumerate() {
            tx.execute(
                "INSERT INTO parents (document_id, position, content) VALUES (?1, ?2, ?3)",
                params![document_id, i64::try_from(position).unwrap_or(i64::MAX), parent],
            )?;
            let parent_id = tx.last_insert_rowid();
            for child in children {
                let vector = vectors.next().ok_or_else(|| IndexError::Embedding {
                    message: "ran out of embeddings while storing children".to_string(),
                })?;
                tx.execute(
                    "INSERT INTO children (parent_id, content, embedding) VALUES (?1, ?2, ?3)",
                    params![parent_id, child, vec_to_blob(&vector)],
                )?;
            }
        }
        tx.commit()?;

        info!(source, document_id, "document ingested");
        Ok(IngestReport {
            document_id,
            source: source.to_string(),
            parents: families.len(),
            children: child_texts.len(),
        })
    }

    /// Summarizes index contents.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<usize, IndexError> {
            let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        Ok(IndexStats {
            documents: count("documents")?,
            parents: count("parents")?,
            children: count("children")?,
            embedder: Self::meta(&conn, "embedder")?,
            dimensions: Self::stored_dimensions(&conn)?,
        })
    }

    fn load_children(&self) -> Result<Vec<(i64, Vec<f32>)>, IndexError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT parent_id, embedding FROM children ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                let parent_id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((parent_id, blob_to_vec(&blob)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn load_parents(&self, ids: &[i64]) -> Result<Vec<String>, IndexError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT content FROM parents WHERE id = ?1")?;
        let mut passages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(content) = stmt
                .query_row(params![id], |row| row.get::<_, String>(0))
                .optional()?
            {
                passages.push(content);
            }
        }
        Ok(passages)
    }
}

#[async_trait]
impl DocumentIndex for SqliteIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>, IndexError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding {
                message: "embedder returned no vector for the query".to_string(),
            })?;

        {
            let conn = self.lock()?;
            if let Some(expected) = Self::stored_dimensions(&conn)?
                && expected != query_vector.len()
            {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let children = self.load_children()?;
        let parent_ids = rank_parents(&query_vector, &children, top_k);
        debug!(
            candidates = children.len(),
            selected = parent_ids.len(),
            "index search"
        );
        self.load_parents(&parent_ids)
    }
}

/// Scores every child, then walks them best-first collecting distinct
/// parents until `top_k` are found. Equal scores keep storage order.
fn rank_parents(query: &[f32], children: &[(i64, Vec<f32>)], top_k: usize) -> Vec<i64> {
    let mut scored: Vec<(usize, f32)> = children
        .par_iter()
        .enumerate()
        .map(|(i, (_, embedding))| (i, cosine_similarity(query, embedding)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut selected: Vec<i64> = Vec::with_capacity(top_k);
    for (i, _) in scored {
        let parent_id = children[i].0;
        if !selected.contains(&parent_id) {
            selected.push(parent_id);
            if selected.len() == top_k {
                break;
            }
        }
    }
    selected
}

fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
