//! Vector store seam: the [`VectorIndex`] trait and the record types
//! exchanged with it.
//!
//! The vector store is an external service. The trait abstracts its
//! collection-scoped surface (get-or-create, upsert, similarity query,
//! count) so pipeline code works against any backend:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │   VectorIndex    │
//!                  │  (async, cosine) │
//!                  └────────┬─────────┘
//!                           │
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!      ┌─────────────────┐     ┌─────────────────┐
//!      │ ChromaVectorIndex│    │ MemoryVectorIndex│
//!      │  (HTTP service)  │    │  (tests, demos)  │
//!      └─────────────────┘     └─────────────────┘
//! ```
//!
//! Transport and service failures map to [`RagError::Store`]; the adapters
//! never retry internally — retry policy belongs to callers.

pub mod chroma;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use chroma::ChromaVectorIndex;
pub use memory::MemoryVectorIndex;

/// Metadata stored alongside every chunk, returned verbatim on retrieval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub title: String,
    pub source: String,
    pub url: String,
    pub date: String,
    pub description: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub article_id: String,
}

/// A chunk ready for storage: globally unique id, text, metadata, vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// Position-aligned result of a similarity query, in the store's native
/// relevance order. Not re-sorted client-side.
#[derive(Clone, Debug, Default)]
pub struct RetrievalResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Collection-scoped operations of the external vector store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection if absent (cosine similarity space).
    async fn ensure_collection(&self, collection: &str) -> Result<(), RagError>;

    /// Stores documents with their vectors. Ids are the only uniqueness
    /// invariant; callers are expected to skip rather than merge on
    /// re-ingestion.
    async fn upsert(
        &self,
        collection: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<(), RagError>;

    /// Nearest-neighbor query. Fails with [`RagError::Store`] if the
    /// collection does not exist; the result carries the top-k matches of
    /// the first query vector.
    async fn query(
        &self,
        collection: &str,
        query_vectors: &[Vec<f32>],
        top_k: usize,
    ) -> Result<RetrievalResult, RagError>;

    /// Number of documents in the collection.
    async fn count(&self, collection: &str) -> Result<usize, RagError>;
}
