// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod ingest;
pub mod tracking;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::ingest::types::{DatasetSource, MergedRecord, NormalizedRecord};
pub use crate::ingest::{clean_text, clean_value};
pub use crate::tracking::{ExperimentContext, MlflowClient};
