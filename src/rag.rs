//! Answer synthesis over retrieved chunks.
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::{Query, StoreHandle};
use crate::provider::{ChatModel, Embedder, Message};
use crate::store::SourcedResult;

const SYSTEM_PROMPT: &str = "you are a helpful assistant that answers questions based on indexed documentation and source code.
answer based solely on the provided context from the indexed repositories.
if the context doesn't contain enough information to answer the question, say so.
always cite the source documents when answering.
when showing code examples, preserve the formatting and explain what the code does.";

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Chunks the answer was grounded on, best first.
    pub results: Vec<SourcedResult>,
}

pub struct Rag<'a> {
    pub handle: &'a StoreHandle,
    pub embedder: Arc<dyn Embedder>,
    pub chat: &'a dyn ChatModel,
}

impl<'a> Rag<'a> {
    pub fn new(handle: &'a StoreHandle, embedder: Arc<dyn Embedder>, chat: &'a dyn ChatModel) -> Self {
        Self {
            handle,
            embedder,
            chat,
        }
    }

    /// Retrieve `top_k` chunks for `question` and ask the chat model.
    pub async fn answer(&self, question: &str, top_k: usize, sources: &[String]) -> Result<Answer> {
        let query = Query::new(question, top_k).with_sources(sources.to_vec());
        let results = self.handle.query(&query, &self.embedder).await?;
        debug!("Retrieved {} chunks for question", results.len());

        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(format!("{}\n\nquestion: {question}", build_context(&results))),
        ];
        let text = self.chat.chat(&messages).map_err(|source| Error::Provider {
            chunk_index: 0,
            bytes: messages[1].content.len(),
            source,
        })?;

        Ok(Answer { text, results })
    }
}

/// Context block handed to the chat model, one section per result.
#[must_use]
pub fn build_context(results: &[SourcedResult]) -> String {
    let mut out =
        String::from("here is the relevant context from the indexed documentation and source code:\n\n");
    for (i, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "--- document {} (source: {}, type: {}, similarity: {:.3}) ---",
            i + 1,
            r.chunk.source,
            r.chunk.metadata.doc_type,
            r.similarity
        );
        out.push_str(&r.chunk.text);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata};
    use crate::provider::ProviderError;
    use crate::provider::mock::{MockChat, MockEmbedder};
    use crate::store::{MultiSourceStore, VectorStore};
    use std::sync::Mutex;

    fn result(text: &str, source: &str, similarity: f32) -> SourcedResult {
        SourcedResult {
            source_name: "docs".to_string(),
            chunk: Chunk {
                text: text.to_string(),
                source: source.to_string(),
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    doc_type: "markdown".to_string(),
                    chunk_index: "0".to_string(),
                },
            },
            similarity,
        }
    }

    /// Records the messages it was sent.
    #[derive(Default)]
    struct RecordingChat(Mutex<Vec<Message>>);

    impl ChatModel for RecordingChat {
        fn chat(&self, messages: &[Message]) -> std::result::Result<String, ProviderError> {
            if let Ok(mut seen) = self.0.lock() {
                seen.extend_from_slice(messages);
            }
            Ok("recorded".to_string())
        }
    }

    #[test]
    fn test_build_context_format() {
        let ctx = build_context(&[result("alpha body", "a.md", 0.91234), result("beta", "b.md", 0.5)]);
        assert!(ctx.contains("--- document 1 (source: a.md, type: markdown, similarity: 0.912) ---\nalpha body\n\n"));
        assert!(ctx.contains("--- document 2 (source: b.md, type: markdown, similarity: 0.500) ---"));
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context() {
        let embedder = Arc::new(MockEmbedder::new(16));
        let mut store = VectorStore::new();
        let chunk = result("the retry budget is three attempts", "retry.md", 0.0).chunk;
        store.add(chunk, embedder.embed("the retry budget is three attempts").unwrap());
        let mut multi = MultiSourceStore::new("unused");
        multi.insert("docs", store);
        let handle = StoreHandle::new(multi);

        let chat = RecordingChat::default();
        let answer = Rag::new(&handle, embedder.clone(), &chat)
            .answer("the retry budget is three attempts", 3, &[])
            .await
            .unwrap();
        assert_eq!(answer.text, "recorded");
        assert_eq!(answer.results.len(), 1);

        let seen = chat.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].content.contains("source: retry.md"));
        assert!(seen[1].content.ends_with("question: the retry budget is three attempts"));

        let mock = Rag::new(&handle, embedder, &MockChat)
            .answer("anything", 1, &["missing".to_string()])
            .await
            .unwrap();
        assert!(mock.results.is_empty());
    }
}
