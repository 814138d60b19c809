//! Query-time orchestration: retrieve → assemble → generate → persist.
//!
//! Each step is a pure function of the previous step's output; the only
//! state lives in the external vector and session stores. Failures are
//! reported structurally in [`QueryOutcome`], never thrown past this
//! boundary.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::context::assemble;
use crate::embeddings::EmbeddingGateway;
use crate::generation::AnswerGenerator;
use crate::session::SessionStore;
use crate::stores::{RetrievalResult, VectorIndex};
use crate::types::{ConversationTurn, RagError, Source};

/// Fixed reply when retrieval finds nothing relevant (or the collection is
/// absent or empty). The generative model is not consulted in that case.
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the news articles to answer your question. \
     Please try a different question or check if the news collection has been populated.";

/// Fixed reply when the pipeline itself failed (e.g. the vector store was
/// unreachable).
pub const PROCESSING_APOLOGY: &str =
    "I'm sorry, I encountered an error while processing your question. Please try again.";

#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub collection: String,
    pub top_k: usize,
    /// Most-recent turns included in the prompt context.
    pub history_window: usize,
    /// Diversification switch: shuffle retrieved chunks before formatting
    /// context, trading relevance order for answer variety across repeated
    /// questions. Off by default.
    pub shuffle_context: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            collection: "news_corpus".to_string(),
            top_k: 5,
            history_window: 5,
            shuffle_context: false,
        }
    }
}

/// Structural result of one query.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<Source>,
    pub relevant_documents: usize,
    pub error: Option<String>,
}

/// Collection statistics for the operational surface.
#[derive(Clone, Copy, Debug)]
pub struct RagStats {
    pub news_documents: usize,
}

/// Drives the retrieval-augmented answer flow against injected capability
/// objects.
pub struct RagOrchestrator {
    embeddings: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    generator: AnswerGenerator,
    sessions: Arc<dyn SessionStore>,
    options: QueryOptions,
}

impl RagOrchestrator {
    pub fn new(
        embeddings: EmbeddingGateway,
        index: Arc<dyn VectorIndex>,
        generator: AnswerGenerator,
        sessions: Arc<dyn SessionStore>,
        options: QueryOptions,
    ) -> Self {
        Self {
            embeddings,
            index,
            generator,
            sessions,
            options,
        }
    }

    pub async fn process_query(
        &self,
        question: &str,
        session_id: &str,
        history: &[ConversationTurn],
    ) -> QueryOutcome {
        debug!(
            question = question.chars().take(50).collect::<String>().as_str(),
            session_id,
            "processing query"
        );

        let query_vector = self.embeddings.embed_one(question).await;

        // Queries against a missing collection are a store error by
        // contract, so create-if-absent first: a never-ingested corpus then
        // lands in the no-results terminal rather than the failure path.
        let retrieved = match self.index.ensure_collection(&self.options.collection).await {
            Ok(()) => {
                self.index
                    .query(&self.options.collection, &[query_vector], self.options.top_k)
                    .await
            }
            Err(err) => Err(err),
        };
        let mut retrieval = match retrieved {
            Ok(retrieval) => retrieval,
            Err(err) => {
                warn!(error = %err, "retrieval failed");
                return QueryOutcome {
                    success: false,
                    answer: PROCESSING_APOLOGY.to_string(),
                    sources: Vec::new(),
                    relevant_documents: 0,
                    error: Some(err.to_string()),
                };
            }
        };

        if retrieval.is_empty() {
            info!("no relevant documents retrieved");
            return QueryOutcome {
                success: false,
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                relevant_documents: 0,
                error: None,
            };
        }

        if self.options.shuffle_context {
            shuffle_aligned(&mut retrieval);
        }

        let recent_start = history.len().saturating_sub(self.options.history_window);
        let context = assemble(
            &retrieval.documents,
            &retrieval.metadatas,
            &history[recent_start..],
        );

        let generated = self
            .generator
            .generate(question, &context, &retrieval.metadatas)
            .await;
        if let Some(error) = generated.error {
            return QueryOutcome {
                success: false,
                answer: generated.answer,
                sources: Vec::new(),
                relevant_documents: retrieval.len(),
                error: Some(error),
            };
        }

        // Persist the turn. History storage failing does not retract an
        // already-generated answer; the state machine has no Storing→Failed
        // edge.
        self.persist_turn(session_id, question, &generated.answer, &generated.sources)
            .await;

        QueryOutcome {
            success: true,
            answer: generated.answer,
            sources: generated.sources,
            relevant_documents: retrieval.len(),
            error: None,
        }
    }

    async fn persist_turn(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        sources: &[Source],
    ) {
        if let Err(err) = self
            .sessions
            .append(session_id, ConversationTurn::user(question))
            .await
        {
            warn!(session_id, error = %err, "failed to persist user turn");
            return;
        }
        if let Err(err) = self
            .sessions
            .append(
                session_id,
                ConversationTurn::assistant(answer, sources.to_vec()),
            )
            .await
        {
            warn!(session_id, error = %err, "failed to persist assistant turn");
        }
    }

    /// Document count of the news collection.
    pub async fn collection_stats(&self) -> Result<RagStats, RagError> {
        let news_documents = self.index.count(&self.options.collection).await?;
        Ok(RagStats { news_documents })
    }
}

/// Shuffles documents, metadatas and distances as aligned triples so
/// citations stay attached to their chunks.
fn shuffle_aligned(retrieval: &mut RetrievalResult) {
    let documents = std::mem::take(&mut retrieval.documents);
    let metadatas = std::mem::take(&mut retrieval.metadatas);
    let distances = std::mem::take(&mut retrieval.distances);

    let mut rows: Vec<_> = documents
        .into_iter()
        .zip(metadatas)
        .zip(distances)
        .map(|((document, metadata), distance)| (document, metadata, distance))
        .collect();
    rows.shuffle(&mut rand::rng());

    for (document, metadata, distance) in rows {
        retrieval.documents.push(document);
        retrieval.metadatas.push(metadata);
        retrieval.distances.push(distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::generation::CompletionModel;
    use crate::session::MemorySessionStore;
    use crate::stores::{ChunkMetadata, IndexedDocument, MemoryVectorIndex};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionModel for CountingModel {
        async fn complete(&self, _prompt: &str) -> Result<String, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("an answer grounded in context".to_string())
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn ensure_collection(&self, _collection: &str) -> Result<(), RagError> {
            Ok(())
        }

        async fn upsert(
            &self,
            _collection: &str,
            _documents: Vec<IndexedDocument>,
        ) -> Result<(), RagError> {
            Err(RagError::Store("down".to_string()))
        }

        async fn query(
            &self,
            _collection: &str,
            _query_vectors: &[Vec<f32>],
            _top_k: usize,
        ) -> Result<RetrievalResult, RagError> {
            Err(RagError::Store("vector store unavailable".to_string()))
        }

        async fn count(&self, _collection: &str) -> Result<usize, RagError> {
            Err(RagError::Store("down".to_string()))
        }
    }

    fn metadata(url: &str) -> ChunkMetadata {
        ChunkMetadata {
            title: "Title".into(),
            source: "https://feed.example/rss".into(),
            url: url.to_string(),
            date: "2026-01-01".into(),
            description: String::new(),
            chunk_index: 0,
            total_chunks: 1,
            article_id: "a-1".into(),
        }
    }

    fn orchestrator(
        index: Arc<dyn VectorIndex>,
        calls: Arc<AtomicUsize>,
        sessions: Arc<MemorySessionStore>,
    ) -> RagOrchestrator {
        RagOrchestrator::new(
            EmbeddingGateway::new(Arc::new(MockEmbeddingProvider::new())),
            index,
            AnswerGenerator::new(Arc::new(CountingModel { calls })),
            sessions,
            QueryOptions::default(),
        )
    }

    #[tokio::test]
    async fn empty_collection_short_circuits_without_generation() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.ensure_collection("news_corpus").await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(MemorySessionStore::new());
        let orchestrator = orchestrator(index, calls.clone(), sessions);

        let outcome = orchestrator.process_query("test", "s-1", &[]).await;
        assert!(!outcome.success);
        assert!(outcome.answer.contains("couldn't find"));
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.relevant_documents, 0);
        assert!(outcome.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_structurally() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(MemorySessionStore::new());
        let orchestrator = orchestrator(Arc::new(BrokenIndex), calls.clone(), sessions);

        let outcome = orchestrator.process_query("test", "s-1", &[]).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("unavailable"));
        assert_eq!(outcome.answer, PROCESSING_APOLOGY);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_query_persists_both_turns() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.ensure_collection("news_corpus").await.unwrap();
        index
            .upsert(
                "news_corpus",
                vec![IndexedDocument {
                    id: "news_1_0_0".into(),
                    text: "the committee approved the measure".into(),
                    metadata: metadata("https://example.com/a"),
                    embedding: vec![0.5; 384],
                }],
            )
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(MemorySessionStore::new());
        let session_id = sessions.create().await.unwrap();
        let orchestrator = orchestrator(index, calls.clone(), sessions.clone());

        let outcome = orchestrator
            .process_query("what was approved?", &session_id, &[])
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.relevant_documents, 1);
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let turns = sessions.get(&session_id).await.unwrap().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "what was approved?");
        assert_eq!(
            turns[1].sources.as_ref().unwrap()[0].url,
            "https://example.com/a"
        );
    }

    #[tokio::test]
    async fn unknown_session_does_not_fail_the_answer() {
        let index = Arc::new(MemoryVectorIndex::new());
        index.ensure_collection("news_corpus").await.unwrap();
        index
            .upsert(
                "news_corpus",
                vec![IndexedDocument {
                    id: "news_1_0_0".into(),
                    text: "chunk".into(),
                    metadata: metadata("https://example.com/a"),
                    embedding: vec![0.5; 384],
                }],
            )
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let sessions = Arc::new(MemorySessionStore::new());
        let orchestrator = orchestrator(index, calls, sessions);

        let outcome = orchestrator.process_query("q", "never-created", &[]).await;
        assert!(outcome.success);
    }

    #[test]
    fn shuffle_keeps_triples_aligned() {
        let mut retrieval = RetrievalResult {
            documents: (0..8).map(|i| format!("doc {i}")).collect(),
            metadatas: (0..8)
                .map(|i| metadata(&format!("https://example.com/{i}")))
                .collect(),
            distances: (0..8).map(|i| i as f32 / 10.0).collect(),
        };
        shuffle_aligned(&mut retrieval);

        assert_eq!(retrieval.len(), 8);
        for (doc, meta) in retrieval.documents.iter().zip(&retrieval.metadatas) {
            let idx: usize = doc.trim_start_matches("doc ").parse().unwrap();
            assert_eq!(meta.url, format!("https://example.com/{idx}"));
        }
    }
}
