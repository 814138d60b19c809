//! In-process vector index with brute-force cosine search.
//!
//! Backs tests and small deployments; semantics match the HTTP adapter
//! (missing collections error on query/count, distances are cosine
//! distance, ascending).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::RagError;

use super::{IndexedDocument, RetrievalResult, VectorIndex};

#[derive(Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, Vec<IndexedDocument>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection's documents, insertion order. Intended for
    /// assertions in tests and operational introspection.
    pub fn documents(&self, collection: &str) -> Vec<IndexedDocument> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, collection: &str) -> Result<(), RagError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<(), RagError> {
        let mut guard = self.collections.write();
        let entries = guard
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        entries.extend(documents);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_vectors: &[Vec<f32>],
        top_k: usize,
    ) -> Result<RetrievalResult, RagError> {
        let query = query_vectors
            .first()
            .ok_or_else(|| RagError::Store("no query vector supplied".to_string()))?;

        let guard = self.collections.read();
        let entries = guard.get(collection).ok_or_else(|| missing(collection))?;

        let mut scored: Vec<(f32, &IndexedDocument)> = entries
            .iter()
            .map(|doc| (cosine_distance(query, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);

        let mut result = RetrievalResult::default();
        for (distance, doc) in scored {
            result.documents.push(doc.text.clone());
            result.metadatas.push(doc.metadata.clone());
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        let guard = self.collections.read();
        let entries = guard.get(collection).ok_or_else(|| missing(collection))?;
        Ok(entries.len())
    }
}

fn missing(collection: &str) -> RagError {
    RagError::Store(format!("collection '{collection}' not found"))
}

/// Cosine distance in `[0, 2]`; zero-norm vectors are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::ChunkMetadata;

    fn doc(id: &str, text: &str, embedding: Vec<f32>) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                title: "t".into(),
                source: "s".into(),
                url: format!("https://example.com/{id}"),
                date: "2026-01-01".into(),
                description: String::new(),
                chunk_index: 0,
                total_chunks: 1,
                article_id: "a".into(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn query_orders_by_cosine_distance() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("news").await.unwrap();
        index
            .upsert(
                "news",
                vec![
                    doc("far", "far", vec![-1.0, 0.0]),
                    doc("near", "near", vec![1.0, 0.0]),
                    doc("mid", "mid", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let result = index.query("news", &[vec![1.0, 0.0]], 2).await.unwrap();
        assert_eq!(result.documents, vec!["near", "mid"]);
        assert!(result.distances[0] < result.distances[1]);
        assert_eq!(result.metadatas.len(), 2);
    }

    #[tokio::test]
    async fn missing_collection_is_a_store_error() {
        let index = MemoryVectorIndex::new();
        let err = index.query("absent", &[vec![1.0]], 5).await.unwrap_err();
        assert!(matches!(err, RagError::Store(_)));
        assert!(index.count("absent").await.is_err());
    }

    #[tokio::test]
    async fn count_tracks_upserts() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("news").await.unwrap();
        assert_eq!(index.count("news").await.unwrap(), 0);
        index
            .upsert("news", vec![doc("a", "a", vec![0.1, 0.2])])
            .await
            .unwrap();
        assert_eq!(index.count("news").await.unwrap(), 1);
    }

    #[test]
    fn zero_norm_vectors_are_distant() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
