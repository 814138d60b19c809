//! Pipeline drivers: offline ingestion and query-time orchestration.

pub mod ingest;
pub mod query;

pub use ingest::{IngestOptions, IngestReport, IngestionPipeline};
pub use query::{QueryOptions, QueryOutcome, RagOrchestrator, RagStats, NO_RESULTS_ANSWER};
