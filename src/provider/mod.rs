//! Provider capabilities the core depends on.
//!
//! The engine never talks HTTP itself: it only needs "text → fixed-length
//! vector" for indexing and querying, and "messages → text" for answer
//! synthesis. Concrete OpenAI/Voyage/Ollama clients live outside this crate.
pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by an embedding or chat provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text embedding capability.
///
/// All implementations must be `Send + Sync` so a single provider can be
/// shared behind `Arc` between the watch loop and query serving.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded in index metadata.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion capability, used only for answer synthesis.
pub trait ChatModel: Send + Sync {
    fn chat(&self, messages: &[Message]) -> Result<String, ProviderError>;
}
