//! Load a source file into text segments for processing.
//!
//! Plain text (`.txt`, `.md`) becomes one segment. PDF files become one
//! segment per page, each tagged with its 1-based page number. Every
//! segment carries the file name as `source` metadata.

use std::path::Path;

use serde_json::json;

use ragline_core::chunk::Segment;
use ragline_core::models::Metadata;

/// A file read from disk, ready for [`ragline_core::process::Processor`].
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub name: String,
    /// Size on disk in bytes.
    pub size: u64,
    pub segments: Vec<Segment>,
}

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    UnsupportedExtension(String),
    Pdf(String),
    Encoding(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "failed to read file: {}", e),
            LoadError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file type '{}': use .txt, .md or .pdf", ext)
            }
            LoadError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            LoadError::Encoding(name) => write!(f, "{} is not valid UTF-8", name),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err)
    }
}

fn source_metadata(name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), json!(name));
    metadata
}

/// Split already-read bytes into segments according to the file extension.
pub fn segments_from_bytes(name: &str, bytes: &[u8]) -> Result<Vec<Segment>, LoadError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| LoadError::Encoding(name.to_string()))?;
            Ok(vec![Segment {
                text: text.to_string(),
                metadata: source_metadata(name),
            }])
        }
        "pdf" => {
            let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
                .map_err(|e| LoadError::Pdf(e.to_string()))?;
            Ok(pages
                .into_iter()
                .enumerate()
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(i, text)| {
                    let mut metadata = source_metadata(name);
                    metadata.insert("page".to_string(), json!(i + 1));
                    Segment { text, metadata }
                })
                .collect())
        }
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

/// Read `path` and split it into segments.
pub fn load_file(path: &Path) -> Result<LoadedAsset, LoadError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let segments = segments_from_bytes(&name, &bytes)?;

    Ok(LoadedAsset {
        name,
        size: bytes.len() as u64,
        segments,
    })
}
