//! HTTP adapter for a Chroma-style vector store service.
//!
//! Collections are addressed by name at this seam; the service addresses
//! them by id, so resolved ids are cached per adapter instance. Collections
//! are created with a cosine similarity space. Failures map to
//! [`RagError::Store`] and are not retried here.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;

use crate::types::RagError;

use super::{ChunkMetadata, IndexedDocument, RetrievalResult, VectorIndex};

pub struct ChromaVectorIndex {
    client: reqwest::Client,
    base_url: String,
    collection_ids: RwLock<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

impl ChromaVectorIndex {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection_ids: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a collection name to its service id without creating it.
    async fn resolve(&self, collection: &str) -> Result<String, RagError> {
        if let Some(id) = self.collection_ids.read().get(collection) {
            return Ok(id.clone());
        }
        let url = format!("{}/api/v1/collections/{collection}", self.base_url);
        let info: CollectionInfo = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(store_err)?
            .error_for_status()
            .map_err(|_| RagError::Store(format!("collection '{collection}' not found")))?
            .json()
            .await
            .map_err(store_err)?;
        self.collection_ids
            .write()
            .insert(collection.to_string(), info.id.clone());
        Ok(info.id)
    }
}

#[async_trait]
impl VectorIndex for ChromaVectorIndex {
    async fn ensure_collection(&self, collection: &str) -> Result<(), RagError> {
        let url = format!("{}/api/v1/collections", self.base_url);
        let info: CollectionInfo = self
            .client
            .post(&url)
            .json(&json!({
                "name": collection,
                "metadata": { "hnsw:space": "cosine" },
                "get_or_create": true,
            }))
            .send()
            .await
            .map_err(store_err)?
            .error_for_status()
            .map_err(store_err)?
            .json()
            .await
            .map_err(store_err)?;
        self.collection_ids
            .write()
            .insert(collection.to_string(), info.id);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        documents: Vec<IndexedDocument>,
    ) -> Result<(), RagError> {
        if documents.is_empty() {
            return Ok(());
        }
        let id = self.resolve(collection).await?;

        let mut ids = Vec::with_capacity(documents.len());
        let mut texts = Vec::with_capacity(documents.len());
        let mut metadatas = Vec::with_capacity(documents.len());
        let mut embeddings = Vec::with_capacity(documents.len());
        for doc in documents {
            ids.push(doc.id);
            texts.push(doc.text);
            metadatas.push(serde_json::to_value(&doc.metadata).map_err(store_err)?);
            embeddings.push(doc.embedding);
        }

        let url = format!("{}/api/v1/collections/{id}/add", self.base_url);
        self.client
            .post(&url)
            .json(&json!({
                "ids": ids,
                "documents": texts,
                "metadatas": metadatas,
                "embeddings": embeddings,
            }))
            .send()
            .await
            .map_err(store_err)?
            .error_for_status()
            .map_err(store_err)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_vectors: &[Vec<f32>],
        top_k: usize,
    ) -> Result<RetrievalResult, RagError> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/api/v1/collections/{id}/query", self.base_url);
        let response: QueryResponse = self
            .client
            .post(&url)
            .json(&json!({
                "query_embeddings": query_vectors,
                "n_results": top_k,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await
            .map_err(store_err)?
            .error_for_status()
            .map_err(store_err)?
            .json()
            .await
            .map_err(store_err)?;

        // The service nests results per query vector; the contract exposes
        // the first query's matches.
        let documents = response.documents.into_iter().next().unwrap_or_default();
        let raw_metadatas = response.metadatas.into_iter().next().unwrap_or_default();
        let distances = response.distances.into_iter().next().unwrap_or_default();

        let mut metadatas = Vec::with_capacity(raw_metadatas.len());
        for value in raw_metadatas {
            let metadata: ChunkMetadata = serde_json::from_value(value).map_err(store_err)?;
            metadatas.push(metadata);
        }

        Ok(RetrievalResult {
            documents,
            metadatas,
            distances,
        })
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/api/v1/collections/{id}/count", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .map_err(store_err)?
            .error_for_status()
            .map_err(store_err)?
            .json()
            .await
            .map_err(store_err)
    }
}

fn store_err(err: impl std::fmt::Display) -> RagError {
    RagError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn metadata_json() -> serde_json::Value {
        json!({
            "title": "Title",
            "source": "https://feed.example/rss",
            "url": "https://example.com/article",
            "date": "2026-01-01",
            "description": "Desc",
            "chunk_index": 0,
            "total_chunks": 1,
            "article_id": "a-1",
        })
    }

    #[tokio::test]
    async fn ensure_collection_posts_cosine_space_and_caches_id() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/collections")
                    .json_body_partial(r#"{"name": "news_corpus", "get_or_create": true}"#);
                then.status(200)
                    .json_body(json!({"id": "col-1", "name": "news_corpus"}));
            })
            .await;
        let count = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections/col-1/count");
                then.status(200).json_body(json!(7));
            })
            .await;

        let index = ChromaVectorIndex::new(reqwest::Client::new(), server.base_url());
        index.ensure_collection("news_corpus").await.unwrap();
        // Cached id: no name lookup needed for the follow-up count.
        assert_eq!(index.count("news_corpus").await.unwrap(), 7);

        create.assert_async().await;
        count.assert_async().await;
    }

    #[tokio::test]
    async fn query_unnests_first_result_set() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections/news_corpus");
                then.status(200).json_body(json!({"id": "col-9"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/collections/col-9/query");
                then.status(200).json_body(json!({
                    "ids": [["news_1_0_0"]],
                    "documents": [["chunk text"]],
                    "metadatas": [[metadata_json()]],
                    "distances": [[0.12]],
                }));
            })
            .await;

        let index = ChromaVectorIndex::new(reqwest::Client::new(), server.base_url());
        let result = index
            .query("news_corpus", &[vec![0.0; 3]], 5)
            .await
            .unwrap();
        assert_eq!(result.documents, vec!["chunk text"]);
        assert_eq!(result.metadatas[0].url, "https://example.com/article");
        assert_eq!(result.distances, vec![0.12]);
    }

    #[tokio::test]
    async fn missing_collection_surfaces_as_store_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections/absent");
                then.status(404);
            })
            .await;

        let index = ChromaVectorIndex::new(reqwest::Client::new(), server.base_url());
        let err = index.query("absent", &[vec![0.0]], 5).await.unwrap_err();
        assert!(matches!(err, RagError::Store(_)));
    }

    #[tokio::test]
    async fn upsert_sends_aligned_batches() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections/news_corpus");
                then.status(200).json_body(json!({"id": "col-2"}));
            })
            .await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/collections/col-2/add")
                    .json_body_partial(r#"{"ids": ["news_1_0_0"], "documents": ["chunk text"]}"#);
                then.status(201);
            })
            .await;

        let index = ChromaVectorIndex::new(reqwest::Client::new(), server.base_url());
        let metadata: ChunkMetadata = serde_json::from_value(metadata_json()).unwrap();
        index
            .upsert(
                "news_corpus",
                vec![IndexedDocument {
                    id: "news_1_0_0".into(),
                    text: "chunk text".into(),
                    metadata,
                    embedding: vec![0.1, 0.2],
                }],
            )
            .await
            .unwrap();
        add.assert_async().await;
    }
}
