// src/ingest/merge.rs
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::ingest::normalize::{label_distribution, process_omdena_dataset, process_posadas_dataset};
use crate::ingest::table::ensure_parent_dir;
use crate::ingest::types::{DatasetSource, MergedRecord, NormalizedRecord};

/// Concatenate normalized sources in the given order and assign positional ids.
/// More than two distinct labels is logged, not rejected.
pub fn merge<I>(sources: I) -> Vec<MergedRecord>
where
    I: IntoIterator<Item = Vec<NormalizedRecord>>,
{
    let all: Vec<NormalizedRecord> = sources.into_iter().flatten().collect();

    let labels: BTreeSet<&str> = all.iter().map(|r| r.label.as_str()).collect();
    if labels.len() > 2 {
        tracing::warn!(labels = ?labels, "more than two distinct labels after merge");
    }

    all.into_iter()
        .enumerate()
        .map(|(i, r)| MergedRecord::from_normalized(i, r))
        .collect()
}

/// Normalize both raw CSVs, merge (posadas first, then omdena) and write the final CSV.
pub fn merge_datasets(
    posadas_path: &Path,
    omdena_path: &Path,
    output_path: &Path,
) -> Result<Vec<MergedRecord>> {
    let posadas = process_posadas_dataset(posadas_path)?;
    let omdena = process_omdena_dataset(omdena_path)?;

    let merged = merge([posadas, omdena]);
    write_records(&merged, &MergedRecord::COLUMNS, output_path).inspect_err(|e| {
        tracing::error!(path = %output_path.display(), error = ?e, "writing merged csv failed")
    })?;

    let labels = label_distribution(merged.iter().map(|r| r.label.as_str()));
    let mut provenance: BTreeMap<DatasetSource, usize> = BTreeMap::new();
    for r in &merged {
        *provenance.entry(r.dataset_source).or_insert(0) += 1;
    }
    tracing::info!(
        path = %output_path.display(),
        rows = merged.len(),
        labels = ?labels,
        dataset_source = ?provenance,
        "saved merged dataset"
    );
    Ok(merged)
}

/// Write serde records as CSV under a fixed header, overwriting `path`.
/// The header is written even when `records` is empty.
pub fn write_records<T: Serialize>(records: &[T], header: &[&str], path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating csv {}", path.display()))?;
    wtr.write_record(header)
        .with_context(|| format!("writing header to {}", path.display()))?;
    for r in records {
        wtr.serialize(r)
            .with_context(|| format!("writing record to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("flushing csv {}", path.display()))?;
    metrics::counter!("pipeline_rows_written_total").increment(records.len() as u64);
    Ok(())
}

pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr =
        csv::Reader::from_path(path).with_context(|| format!("opening csv {}", path.display()))?;
    rdr.deserialize()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("decoding row {} of {}", i + 1, path.display())))
        .collect()
}
