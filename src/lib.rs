//! # ragline
//!
//! A retrieval-augmented generation service: split documents into chunks,
//! embed them into a per-project vector collection, and answer questions
//! with a prompt grounded in the best-matching chunks.
//!
//! The backend-agnostic pipeline (traits, orchestrators, templates) lives in
//! the `ragline-core` crate. This crate supplies the concrete backends and
//! the outer surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │  loader  │──▶│  Processor  │──▶│  SQLite   │
//! │ txt/pdf  │   │ split+store │   │  chunks   │
//! └──────────┘   └─────────────┘   └─────┬─────┘
//!                                        │ pages
//!                                        ▼
//!                ┌─────────────┐   ┌───────────┐
//!                │  Embedding  │◀──│  Indexer  │──▶ Qdrant / memory
//!                │  provider   │   └───────────┘
//!                └─────────────┘         ▲
//!                                        │ search
//!                ┌─────────────┐   ┌───────────┐
//!                │ Generation  │◀──│    Rag    │◀── CLI / HTTP
//!                │  provider   │   └───────────┘
//!                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`loader`] | File → text segments |
//! | [`providers`] | OpenAI, Cohere, Ollama, local embeddings |
//! | [`qdrant`] | Qdrant vector store |
//! | [`services`] | Construct everything from config |
//! | [`commands`] | CLI command implementations |
//! | [`server`] | HTTP server |

pub mod commands;
pub mod config;
pub mod db;
pub mod loader;
pub mod migrate;
pub mod providers;
pub mod qdrant;
pub mod server;
pub mod services;
pub mod sqlite_store;

pub use ragline_core;
