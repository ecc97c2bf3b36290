//! Offline providers for tests and dry runs.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{ChatModel, Embedder, Message, ProviderError};

/// Deterministic embedder: the text hash seeds a xorshift stream whose
/// outputs become the vector components, then the vector is L2-normalized.
///
/// Identical texts always get identical vectors, so a chunk searched with
/// its own text scores 1.0.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        // xorshift must not start at zero
        let mut state = hasher.finish() | 1;

        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                // Top 24 bits → [-1, 1)
                ((state >> 40) as f32 / (1u64 << 23) as f32) - 1.0
            })
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Chat model that reports how much context it was given.
#[derive(Debug, Default)]
pub struct MockChat;

impl ChatModel for MockChat {
    fn chat(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let last = messages
            .last()
            .ok_or_else(|| ProviderError::InvalidResponse("no messages".to_string()))?;
        Ok(format!("mock answer ({} chars of context)", last.content.len()))
    }
}
