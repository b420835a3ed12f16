// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::ingest::table::Table;

/// Which corpus a normalized row came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    Omdena,
    Posadas,
}

impl DatasetSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetSource::Omdena => "omdena",
            DatasetSource::Posadas => "posadas",
        }
    }

    /// Map source-specific label spellings onto the shared taxonomy.
    /// Input is already lower-cased.
    pub fn canonical_label(self, label: String) -> String {
        match (self, label.as_str()) {
            (DatasetSource::Posadas, "false") => "fake".to_string(),
            _ => label,
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One article in the common five-column schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub label: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub dataset_source: DatasetSource,
}

impl NormalizedRecord {
    pub const COLUMNS: [&'static str; 5] = ["label", "content", "title", "source", "dataset_source"];
}

/// A normalized record with its positional id (`fn_000000`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergedRecord {
    pub id: String,
    pub label: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub dataset_source: DatasetSource,
}

impl MergedRecord {
    pub const COLUMNS: [&'static str; 6] =
        ["id", "label", "content", "title", "source", "dataset_source"];

    pub fn from_normalized(index: usize, r: NormalizedRecord) -> Self {
        Self {
            id: format!("fn_{index:06}"),
            label: r.label,
            content: r.content,
            title: r.title,
            source: r.source,
            dataset_source: r.dataset_source,
        }
    }
}

/// Remote dataset hub that can hand back a named split as a table.
#[async_trait::async_trait]
pub trait DatasetHub {
    async fn load_split(&self, dataset: &str, split: &str) -> Result<Table>;
    fn name(&self) -> &'static str;
}

/// Reads a downloaded spreadsheet into a table (first row is the header).
pub trait SheetLoader {
    fn load(&self, path: &Path) -> Result<Table>;
}
