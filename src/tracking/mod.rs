// src/tracking/mod.rs
pub mod mlflow;

pub use mlflow::{ActiveRun, ExperimentContext, MlflowClient, RunStatus};
