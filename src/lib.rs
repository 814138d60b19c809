//! Retrieval-augmented question answering over a news corpus.
//!
//! ```text
//! RSS feeds ──► sources::RssDocumentSource ──► normalize ──► chunking
//!                                                                │
//!                                       embeddings::EmbeddingGateway
//!                                                                │
//!                              pipeline::IngestionPipeline ──► stores::VectorIndex
//!
//! question ──► embeddings ──► stores::VectorIndex::query ──► context::assemble
//!                                                                │
//!          pipeline::RagOrchestrator ◄── generation::AnswerGenerator
//!                       │
//!                       └──► session::SessionStore (conversation turns)
//! ```
//!
//! Every external collaborator — document source, embedding service,
//! generative model, vector store, session store — sits behind a trait, so
//! the pipelines run unchanged against production adapters or the
//! deterministic in-process implementations used by the test suite.

pub mod chunking;
pub mod context;
pub mod embeddings;
pub mod generation;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod sources;
pub mod stores;
pub mod types;

pub use chunking::chunk;
pub use embeddings::{EmbeddingGateway, EmbeddingProvider, HttpEmbeddingClient, MockEmbeddingProvider};
pub use generation::{AnswerGenerator, CompletionModel, HttpCompletionClient};
pub use normalize::normalize;
pub use pipeline::{
    IngestOptions, IngestReport, IngestionPipeline, QueryOptions, QueryOutcome, RagOrchestrator,
    RagStats,
};
pub use session::{MemorySessionStore, SessionStore};
pub use sources::{DocumentSource, FeedItem, RssDocumentSource};
pub use stores::{
    ChromaVectorIndex, ChunkMetadata, IndexedDocument, MemoryVectorIndex, RetrievalResult,
    VectorIndex,
};
pub use types::{Article, ConversationTurn, RagConfig, RagError, Role, Source};
