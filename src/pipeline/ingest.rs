//! Collection driver: feeds → articles → chunks → vectors → store.
//!
//! The feed and article loops are intentionally sequential with explicit
//! pacing delays; the external sources and free-tier services set the
//! throughput ceiling, not this crate. A populated collection short-circuits
//! the whole run: re-ingestion is idempotent-by-skip, so chunking-parameter
//! changes only take effect after an external collection drop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunking::chunk;
use crate::embeddings::EmbeddingGateway;
use crate::normalize::normalize;
use crate::sources::{DocumentSource, DEFAULT_FEEDS};
use crate::stores::{ChunkMetadata, IndexedDocument, VectorIndex};
use crate::types::{Article, RagError};

/// Tunables for one collection run. One options struct replaces the
/// hardcoded per-host collector variants.
#[derive(Clone, Debug)]
pub struct IngestOptions {
    pub collection: String,
    pub feeds: Vec<String>,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Documents per upsert batch.
    pub batch_size: usize,
    /// Articles taken from the head of each feed listing.
    pub feed_cap: usize,
    /// Maximum chars of normalized body kept per article.
    pub per_article_cap: usize,
    /// Articles with less normalized content than this are skipped.
    pub min_content_chars: usize,
    pub article_delay: Duration,
    pub feed_delay: Duration,
    pub batch_delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            collection: "news_corpus".to_string(),
            feeds: DEFAULT_FEEDS.iter().map(|feed| feed.to_string()).collect(),
            chunk_size: 600,
            overlap: 60,
            batch_size: 10,
            feed_cap: 20,
            per_article_cap: 1000,
            min_content_chars: 50,
            article_delay: Duration::from_secs(1),
            feed_delay: Duration::from_secs(2),
            batch_delay: Duration::from_secs(2),
        }
    }
}

/// Structural result of a run; never thrown past this boundary.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub success: bool,
    pub articles: usize,
    pub chunks: usize,
    /// True when the collection was already populated and the run skipped.
    pub skipped: bool,
    pub error: Option<String>,
}

impl IngestReport {
    fn failure(err: RagError) -> Self {
        Self {
            success: false,
            articles: 0,
            chunks: 0,
            skipped: false,
            error: Some(err.to_string()),
        }
    }
}

struct PendingChunk {
    id: String,
    text: String,
    metadata: ChunkMetadata,
}

/// Drives collection against injected capability objects.
pub struct IngestionPipeline {
    source: Arc<dyn DocumentSource>,
    embeddings: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        embeddings: EmbeddingGateway,
        index: Arc<dyn VectorIndex>,
        options: IngestOptions,
    ) -> Self {
        Self {
            source,
            embeddings,
            index,
            options,
        }
    }

    pub async fn run(&self) -> IngestReport {
        let collection = self.options.collection.as_str();
        info!(
            collection,
            feeds = self.options.feeds.len(),
            "starting news ingestion"
        );

        if let Err(err) = self.index.ensure_collection(collection).await {
            return IngestReport::failure(err);
        }
        match self.index.count(collection).await {
            Ok(existing) if existing > 0 => {
                info!(collection, existing, "collection already populated, skipping run");
                return IngestReport {
                    success: true,
                    articles: 0,
                    chunks: existing,
                    skipped: true,
                    error: None,
                };
            }
            Ok(_) => {}
            Err(err) => return IngestReport::failure(err),
        }

        let articles = self.collect_articles().await;
        if articles.is_empty() {
            warn!("no articles collected from any feed");
            return IngestReport {
                success: false,
                articles: 0,
                chunks: 0,
                skipped: false,
                error: Some("no articles collected".to_string()),
            };
        }
        info!(count = articles.len(), "collected articles");

        match self.store_articles(&articles).await {
            Ok(chunks) => {
                info!(articles = articles.len(), chunks, "ingestion complete");
                IngestReport {
                    success: true,
                    articles: articles.len(),
                    chunks,
                    skipped: false,
                    error: None,
                }
            }
            Err(err) => IngestReport::failure(err),
        }
    }

    /// Walks the configured feeds sequentially. Feed and article failures
    /// are logged and skipped; they never abort the run.
    async fn collect_articles(&self) -> Vec<Article> {
        let mut articles = Vec::new();

        for (feed_idx, feed_url) in self.options.feeds.iter().enumerate() {
            info!(
                feed = feed_url.as_str(),
                position = feed_idx + 1,
                total = self.options.feeds.len(),
                "fetching feed"
            );
            let items = match self.source.list_feed_items(feed_url).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(feed = feed_url.as_str(), error = %err, "feed fetch failed, skipping");
                    continue;
                }
            };
            info!(feed = feed_url.as_str(), items = items.len(), "feed listed");

            for item in items.into_iter().take(self.options.feed_cap) {
                let body = match self.source.fetch_body(&item.link).await {
                    Ok(Some(body)) => body,
                    Ok(None) => {
                        self.pace(self.options.article_delay).await;
                        continue;
                    }
                    Err(err) => {
                        warn!(url = item.link.as_str(), error = %err, "article fetch failed, skipping");
                        self.pace(self.options.article_delay).await;
                        continue;
                    }
                };

                let content: String = normalize(&body)
                    .chars()
                    .take(self.options.per_article_cap)
                    .collect();
                if content.chars().count() < self.options.min_content_chars {
                    warn!(url = item.link.as_str(), "insufficient content, skipping article");
                    self.pace(self.options.article_delay).await;
                    continue;
                }

                articles.push(Article {
                    id: Uuid::new_v4(),
                    title: normalize(&item.title),
                    link: item.link,
                    description: normalize(&item.description),
                    published_at: item.published_at,
                    source_feed: feed_url.clone(),
                    content,
                });
                self.pace(self.options.article_delay).await;
            }

            self.pace(self.options.feed_delay).await;
        }

        articles
    }

    /// Chunks every article, embeds batch by batch, and upserts with
    /// pacing. Chunk ids encode the run start plus article/chunk indices.
    async fn store_articles(&self, articles: &[Article]) -> Result<usize, RagError> {
        let run_started_ms = Utc::now().timestamp_millis();
        let mut pending = Vec::new();

        for (article_idx, article) in articles.iter().enumerate() {
            let full_text = format!(
                "{}\n\n{}\n\n{}",
                article.title, article.description, article.content
            );
            let chunks = chunk(&full_text, self.options.chunk_size, self.options.overlap);
            let total_chunks = chunks.len();

            for (chunk_idx, text) in chunks.into_iter().enumerate() {
                let date = if article.published_at.is_empty() {
                    Utc::now().to_rfc3339()
                } else {
                    article.published_at.clone()
                };
                pending.push(PendingChunk {
                    id: format!("news_{run_started_ms}_{article_idx}_{chunk_idx}"),
                    text,
                    metadata: ChunkMetadata {
                        title: article.title.clone(),
                        source: article.source_feed.clone(),
                        url: article.link.clone(),
                        date,
                        description: article.description.clone(),
                        chunk_index: chunk_idx,
                        total_chunks,
                        article_id: article.id.to_string(),
                    },
                });
            }
        }

        let total = pending.len();
        let batch_size = self.options.batch_size.max(1);
        let batches = total.div_ceil(batch_size);

        for (batch_idx, batch) in pending.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let vectors = self.embeddings.embed_batch(&texts).await;

            let documents: Vec<IndexedDocument> = batch
                .iter()
                .zip(vectors)
                .map(|(p, embedding)| IndexedDocument {
                    id: p.id.clone(),
                    text: p.text.clone(),
                    metadata: p.metadata.clone(),
                    embedding,
                })
                .collect();

            self.index
                .upsert(&self.options.collection, documents)
                .await?;
            info!(batch = batch_idx + 1, batches, "stored batch");
            self.pace(self.options.batch_delay).await;
        }

        Ok(total)
    }

    async fn pace(&self, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::sources::FeedItem;
    use crate::stores::MemoryVectorIndex;
    use async_trait::async_trait;

    struct StaticSource {
        items: Vec<FeedItem>,
        body: String,
    }

    #[async_trait]
    impl DocumentSource for StaticSource {
        async fn list_feed_items(&self, _feed_url: &str) -> Result<Vec<FeedItem>, RagError> {
            Ok(self.items.clone())
        }

        async fn fetch_body(&self, _url: &str) -> Result<Option<String>, RagError> {
            Ok(Some(self.body.clone()))
        }
    }

    struct DeadSource;

    #[async_trait]
    impl DocumentSource for DeadSource {
        async fn list_feed_items(&self, feed_url: &str) -> Result<Vec<FeedItem>, RagError> {
            Err(RagError::SourceFetch(format!("{feed_url} unreachable")))
        }

        async fn fetch_body(&self, _url: &str) -> Result<Option<String>, RagError> {
            Ok(None)
        }
    }

    fn instant_options() -> IngestOptions {
        IngestOptions {
            feeds: vec!["https://feed.example/rss".to_string()],
            per_article_cap: 2000,
            article_delay: Duration::ZERO,
            feed_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
            ..IngestOptions::default()
        }
    }

    fn pipeline_with(
        source: Arc<dyn DocumentSource>,
        index: Arc<MemoryVectorIndex>,
        options: IngestOptions,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            source,
            EmbeddingGateway::new(Arc::new(MockEmbeddingProvider::new())),
            index,
            options,
        )
    }

    #[tokio::test]
    async fn single_article_splits_into_two_indexed_chunks() {
        let index = Arc::new(MemoryVectorIndex::new());
        let source = StaticSource {
            items: vec![FeedItem {
                title: "A".to_string(),
                link: "https://example.com/a".to_string(),
                description: "B".to_string(),
                published_at: "Tue, 04 Aug 2026 09:00:00 GMT".to_string(),
            }],
            body: "x".repeat(1000),
        };

        let report = pipeline_with(Arc::new(source), index.clone(), instant_options())
            .run()
            .await;

        assert!(report.success);
        assert!(!report.skipped);
        assert_eq!(report.articles, 1);
        assert_eq!(report.chunks, 2);

        let stored = index.documents("news_corpus");
        assert_eq!(stored.len(), 2);
        assert!(stored[0].id.starts_with("news_"));
        assert!(stored[0].id.ends_with("_0_0"));
        assert!(stored[1].id.ends_with("_0_1"));
        assert_eq!(stored[0].metadata.chunk_index, 0);
        assert_eq!(stored[1].metadata.chunk_index, 1);
        assert_eq!(stored[0].metadata.total_chunks, 2);
        assert_eq!(stored[0].embedding.len(), 384);
    }

    #[tokio::test]
    async fn populated_collection_short_circuits() {
        let index = Arc::new(MemoryVectorIndex::new());
        let source = StaticSource {
            items: vec![FeedItem {
                title: "A headline long enough".to_string(),
                link: "https://example.com/a".to_string(),
                description: "desc".to_string(),
                published_at: String::new(),
            }],
            body: "x".repeat(1000),
        };
        let pipeline = pipeline_with(Arc::new(source), index.clone(), instant_options());

        let first = pipeline.run().await;
        assert!(first.success && !first.skipped);
        let stored = index.count("news_corpus").await.unwrap();

        let second = pipeline.run().await;
        assert!(second.success);
        assert!(second.skipped);
        assert_eq!(second.articles, 0);
        assert_eq!(second.chunks, stored);
        // Nothing was added on the second run.
        assert_eq!(index.count("news_corpus").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn unreachable_feeds_fail_the_run_structurally() {
        let index = Arc::new(MemoryVectorIndex::new());
        let report = pipeline_with(Arc::new(DeadSource), index, instant_options())
            .run()
            .await;
        assert!(!report.success);
        assert_eq!(report.articles, 0);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn thin_articles_are_skipped() {
        let index = Arc::new(MemoryVectorIndex::new());
        let source = StaticSource {
            items: vec![FeedItem {
                title: "A headline long enough".to_string(),
                link: "https://example.com/a".to_string(),
                description: "desc".to_string(),
                published_at: String::new(),
            }],
            body: "too thin".to_string(),
        };
        let report = pipeline_with(Arc::new(source), index, instant_options())
            .run()
            .await;
        assert!(!report.success);
        assert_eq!(report.articles, 0);
    }
}
