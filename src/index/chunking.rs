//! Recursive character text splitting.
//!
//! Text is split on the coarsest separator present (paragraphs, then lines,
//! then words, then grapheme clusters), and the pieces are merged back
//! into chunks of at most `chunk_size` characters. Consecutive chunks share
//! up to `chunk_overlap` characters of trailing context.

use std::collections::VecDeque;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::IndexError;

/// Default parent chunk size in characters.
pub const DEFAULT_PARENT_SIZE: usize = 3_000;
/// Default parent chunk overlap in characters.
pub const DEFAULT_PARENT_OVERLAP: usize = 50;
/// Default child chunk size in characters.
pub const DEFAULT_CHILD_SIZE: usize = 250;
/// Default child chunk overlap in characters.
pub const DEFAULT_CHILD_OVERLAP: usize = 25;

/// Separators tried in order. The empty separator means grapheme clusters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// A recursive character splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidChunking`] if `chunk_size` is zero or the
    /// overlap is not smaller than the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IndexError> {
        if chunk_size == 0 {
            return Err(IndexError::InvalidChunking {
                message: "chunk size must be positive".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(IndexError::InvalidChunking {
                message: format!(
                    "overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
                ),
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splitter for parent chunks with the default sizes.
    #[must_use]
    pub const fn default_parent() -> Self {
        Self {
            chunk_size: DEFAULT_PARENT_SIZE,
            chunk_overlap: DEFAULT_PARENT_OVERLAP,
        }
    }

    /// Splitter for child chunks with the default sizes.
    #[must_use]
    pub const fn default_child() -> Self {
        Self {
            chunk_size: DEFAULT_CHILD_SIZE,
            chunk_overlap: DEFAULT_CHILD_OVERLAP,
        }
    }

    /// Maximum chunk length in characters.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Splits `text` into chunks. Never yields empty chunks.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.graphemes(true).collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    /// Greedily packs small pieces into chunks, carrying overlap forward.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0_usize;

        let emit = |window: &VecDeque<&str>, chunks: &mut Vec<String>| {
            let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
            let trimmed = joined.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        };

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                emit(&window, &mut chunks);
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }
            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }
        if !window.is_empty() {
            emit(&window, &mut chunks);
        }
        chunks
    }
}
