//! # lrag — local-first retrieval engine
//!
//! Splits source files into bounded chunks, stores them with their
//! embeddings, ranks them against queries by cosine similarity, and keeps
//! each index consistent with an evolving source tree through git or mtime
//! change detection, checkpointed embedding and atomic commits.
//!
//! ## Architecture
//!
//! - **[`indexer`]** — Loading, language-aware chunking, checkpointed embedding, full builds
//! - **[`store`]** — `VectorStore` (search, removal, persistence) and `MultiSourceStore`
//! - **[`changes`]** — Git-diff and mtime change detection producing a `ChangeSet`
//! - **[`updater`]** — Incremental update state machine with full-rebuild fallback
//! - **[`handle`]** — Swappable shared store and the typed `Query`
//! - **[`rag`]** — Context assembly and answer synthesis
//! - **[`watch`]** — Debounced filesystem watching on top of the updater
//! - **[`provider`]** — Embedding and chat capabilities (plus mocks)
//! - **[`config`]** — Configuration loading, validation and defaults

pub mod changes;
pub mod config;
pub mod error;
pub mod handle;
pub mod indexer;
pub mod models;
pub mod paths;
pub mod provider;
pub mod rag;
pub mod store;
pub mod updater;
pub mod watch;

pub use error::{DetectionError, Error, Result};
