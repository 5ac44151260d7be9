//! # Chat Recall
//!
//! Ingestion and hybrid retrieval for short chat messages, backed by an
//! external vector index and an external embedding provider.
//!
//! Messages are normalized, split into retrieval-sized chunks with stable
//! identifiers, embedded, and stored. Retrieval composes semantic
//! nearest-neighbor lookup, exact-text (`contains`) filters, and plain
//! filtered listings into one uniform result shape.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────┐   ┌────────────┐
//! │ HTML export  │──▶│  normalize → chunk →      │──▶│  Vector    │
//! │ posts API    │   │  dedup → embed → add      │   │  index     │
//! │ direct input │   └───────────────────────────┘   └─────┬──────┘
//! └──────────────┘                                         │
//!                          ┌──────────────────────────────┤
//!                          ▼                              ▼
//!                    ┌──────────┐                   ┌──────────┐
//!                    │   CLI    │                   │   HTTP   │
//!                    │ (recall) │                   │  (axum)  │
//!                    └──────────┘                   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Text cleanup pipeline |
//! | [`chunker`] | Recursive size-bounded chunking |
//! | [`filter`] | Typed metadata/text filters and OR-merge |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index trait |
//! | [`index_http`] | Chroma-style HTTP index client |
//! | [`index_memory`] | In-memory index for tests |
//! | [`ingest`] | Deduplicated ingestion and deletion |
//! | [`search`] | Semantic / hybrid / listing search |
//! | [`export`] | Chat HTML-export parsing |
//! | [`tickers`] | Token-symbol extraction |
//! | [`fetcher`] | Remote posts API client |
//! | [`server`] | JSON HTTP server |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod filter;
pub mod index;
pub mod index_http;
pub mod index_memory;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod search;
pub mod server;
pub mod tickers;

pub use error::{Error, Result};
