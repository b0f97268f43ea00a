//! # Ragline Core
//!
//! Backend-agnostic logic for ragline: data models, error kinds, provider
//! traits, vector and document store abstractions (with in-memory
//! backends), the text splitter, localized prompt templates, and the
//! indexing and answer orchestrators.
//!
//! This crate contains no HTTP clients, SQL, or filesystem I/O. Concrete
//! providers and stores live in the `ragline` application crate.

pub mod chunk;
pub mod docstore;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod process;
pub mod provider;
pub mod rag;
pub mod templates;
pub mod vectordb;

pub use error::{RagError, Result};

#[cfg(test)]
mod testing;
