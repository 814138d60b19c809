//! Document source seam: feed listings and article bodies.
//!
//! The scraping stack is an external collaborator; pipelines only consume
//! this trait. [`rss::RssDocumentSource`] is the shipped implementation.

pub mod rss;

use async_trait::async_trait;

use crate::types::RagError;

pub use rss::RssDocumentSource;

/// One entry of a feed listing, prior to body fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: String,
}

/// Produces feed listings and raw article text.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Lists the items a feed currently advertises. Fails with
    /// [`RagError::SourceFetch`] when the feed is unreachable or malformed;
    /// ingestion logs and skips such feeds.
    async fn list_feed_items(&self, feed_url: &str) -> Result<Vec<FeedItem>, RagError>;

    /// Fetches the readable text behind an article url. `None` marks an
    /// article whose body could not be retrieved; the caller skips it.
    async fn fetch_body(&self, url: &str) -> Result<Option<String>, RagError>;
}

/// Curated default feeds for news collection runs.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://rss.cnn.com/rss/edition.rss",
    "https://feeds.reuters.com/reuters/topNews",
    "https://feeds.npr.org/1001/rss.xml",
    "https://feeds.abcnews.com/abcnews/topstories",
    "https://feeds.cbsnews.com/CBSNewsMain",
    "https://feeds.nbcnews.com/nbcnews/public/news",
    "https://feeds.feedburner.com/techcrunch/startups",
    "https://feeds.feedburner.com/arstechnica/index/",
    "https://feeds.feedburner.com/theguardian/technology",
];
