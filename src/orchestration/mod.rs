//! Orchestration of the reconciliation pipeline.

pub mod ingest;

pub use ingest::{IngestError, IngestOrchestrator, IngestResult};
