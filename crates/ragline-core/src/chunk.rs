//! Recursive character text splitter.
//!
//! Splits extracted document text into overlapping chunks no longer than
//! `chunk_size` characters (where a single unsplittable piece allows).
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs
//!    in the text (`""` splits into characters).
//! 2. Split on it. Pieces shorter than `chunk_size` are collected; longer
//!    pieces are split recursively with the remaining separators.
//! 3. Collected pieces are merged back, joined by the separator, into
//!    chunks of at most `chunk_size` characters. When a chunk is emitted,
//!    pieces are dropped from its front until at most `overlap` characters
//!    remain, and those carry into the next chunk.
//! 4. Chunks are trimmed; empty chunks are skipped.
//!
//! Lengths are measured in characters, not bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use ragline_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(100, 20).unwrap();
//! let chunks = splitter.split_text("Hello world.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::models::Metadata;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A unit of extracted text (typically one page) with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Splitter configured with a maximum chunk size and an overlap.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Fails with `RagError::Validation` unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Validation(
                "chunk_size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::Validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one text into chunks. Deterministic for the same input.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Split every segment, each chunk inheriting its segment's metadata.
    /// Output order follows segment order, then chunk order.
    pub fn create_documents(&self, segments: &[Segment]) -> Vec<Segment> {
        segments
            .iter()
            .flat_map(|seg| {
                self.split_text(&seg.text)
                    .into_iter()
                    .map(move |text| Segment {
                        text,
                        metadata: seg.metadata.clone(),
                    })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, &sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge(&good, separator));
                good.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            out.extend(self.merge(&good, separator));
        }
        out
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        let joiner = |current: &VecDeque<&str>| if current.is_empty() { 0 } else { sep_len };

        for piece in pieces {
            let len = char_len(piece);
            if !current.is_empty() && total + len + joiner(&current) > self.chunk_size {
                push_joined(&mut docs, &current, separator);
                while total > self.overlap
                    || (total > 0 && total + len + joiner(&current) > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + joiner(&current);
                }
            }
            let added = len + joiner(&current);
            current.push_back(piece);
            total += added;
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
