//! Shared data model and the crate-wide error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the retrieval pipeline and its service adapters.
///
/// The taxonomy mirrors the propagation policy of the pipeline: failures
/// local to one article, chunk, or embedding are logged and absorbed by the
/// caller (`SourceFetch`, `Embedding`), while store and generation failures
/// abort only the current invocation and are reported structurally.
#[derive(Debug, Error)]
pub enum RagError {
    /// A feed or article could not be fetched or parsed.
    #[error("source fetch failed: {0}")]
    SourceFetch(String),

    /// The embedding service rejected or failed a request.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store is unavailable or refused an operation.
    #[error("vector store failure: {0}")]
    Store(String),

    /// The generative model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The session store is unavailable or the session is unknown.
    #[error("session store failure: {0}")]
    Session(String),

    /// Local I/O failure.
    #[error("io failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

/// An article produced by the document source during a collection run.
///
/// Immutable once fetched; `content` holds the normalized body text, already
/// capped to the per-article limit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: String,
    pub source_feed: String,
    pub content: String,
}

/// A citation extracted from retrieved chunk metadata.
///
/// Deduplicated by `url` across a retrieval result, first-seen order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub source: String,
    pub date: String,
}

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One turn of a conversation, append-only per session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sources: (!sources.is_empty()).then_some(sources),
        }
    }
}

/// External service endpoints and credentials, resolved from the environment.
///
/// Handles built from this config are constructed explicitly and passed into
/// the pipelines; nothing here is a process-wide singleton.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Base URL of the Chroma-style vector store service.
    pub vector_store_url: String,
    /// Feature-extraction endpoint of the embedding service.
    pub embedding_endpoint: String,
    pub embedding_api_key: String,
    /// Base URL of the generative model service.
    pub generation_endpoint: String,
    pub generation_model: String,
    pub generation_api_key: String,
    /// Connection URL for the optional Redis session store.
    pub session_store_url: String,
}

impl RagConfig {
    /// Loads configuration from the environment, honoring a `.env` file.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            vector_store_url: env_or("NEWSRAG_VECTOR_STORE_URL", "http://localhost:8000"),
            embedding_endpoint: env_or(
                "NEWSRAG_EMBEDDING_URL",
                "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2",
            ),
            embedding_api_key: env_or("HUGGINGFACE_API_KEY", ""),
            generation_endpoint: env_or(
                "NEWSRAG_GENERATION_URL",
                "https://generativelanguage.googleapis.com",
            ),
            generation_model: env_or("NEWSRAG_GENERATION_MODEL", "gemini-1.5-flash"),
            generation_api_key: env_or("GEMINI_API_KEY", ""),
            session_store_url: env_or("NEWSRAG_SESSION_STORE_URL", "redis://localhost:6379"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
