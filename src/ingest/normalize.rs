// src/ingest/normalize.rs
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use crate::ingest::clean_text;
use crate::ingest::table::Table;
use crate::ingest::types::{DatasetSource, NormalizedRecord};

pub const DEFAULT_TITLE: &str = "Sin Titulo";
pub const DEFAULT_SOURCE: &str = "Sin Source";
const TITLE_WORDS: usize = 8;

/// Where each common-schema field lives in a source's raw table.
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub dataset: DatasetSource,
    /// Candidate label columns, most preferred first.
    pub label: &'static [&'static str],
    pub content: &'static str,
    pub title: &'static str,
    pub source: &'static str,
}

pub const OMDENA_SCHEMA: SourceSchema = SourceSchema {
    dataset: DatasetSource::Omdena,
    label: &["corrected_label", "prediction"],
    content: "content",
    title: "title",
    source: "source",
};

pub const POSADAS_SCHEMA: SourceSchema = SourceSchema {
    dataset: DatasetSource::Posadas,
    label: &["category"],
    content: "text",
    title: "headline",
    source: "source",
};

/// First eight words of the raw content followed by `"..."`.
/// Cleaning happens afterwards, together with the real titles.
pub fn synthesize_title(raw_content: &str) -> String {
    let head: Vec<&str> = raw_content.split_whitespace().take(TITLE_WORDS).collect();
    if head.is_empty() {
        return String::new();
    }
    format!("{}...", head.join(" "))
}

/// Map a raw source table onto the common schema.
pub fn normalize(table: &Table, schema: &SourceSchema) -> Vec<NormalizedRecord> {
    let label_col = schema.label.iter().find_map(|c| table.column_index(c));
    let content_col = table.column_index(schema.content);
    let title_col = table.column_index(schema.title);
    let source_col = table.column_index(schema.source);

    if label_col.is_none() {
        tracing::warn!(dataset = %schema.dataset, candidates = ?schema.label, "no label column, using empty labels");
    }
    if title_col.is_none() {
        tracing::info!(dataset = %schema.dataset, "no title column, synthesizing from content");
    }

    let cell = |row: usize, col: Option<usize>| col.and_then(|c| table.cell(row, c));

    (0..table.len())
        .map(|i| {
            let raw_content = cell(i, content_col);
            let title = match title_col {
                Some(c) => clean_text(table.cell(i, c)),
                None => clean_text(Some(synthesize_title(raw_content.unwrap_or_default()).as_str())),
            };
            let content = clean_text(raw_content);
            let title = if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            };
            let source = cell(i, source_col)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SOURCE)
                .to_string();
            let label = cell(i, label_col).unwrap_or_default().trim().to_lowercase();

            NormalizedRecord {
                label: schema.dataset.canonical_label(label),
                content,
                title,
                source,
                dataset_source: schema.dataset,
            }
        })
        .collect()
}

pub fn label_distribution<'a, I>(labels: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = BTreeMap::new();
    for l in labels {
        *out.entry(l.to_string()).or_insert(0) += 1;
    }
    out
}

/// Read a raw CSV and normalize it, logging shape and label balance.
pub fn process_dataset(input_path: &Path, schema: &SourceSchema) -> Result<Vec<NormalizedRecord>> {
    tracing::info!(dataset = %schema.dataset, path = %input_path.display(), "processing dataset");
    let table = Table::read_csv(input_path).inspect_err(|e| {
        tracing::error!(dataset = %schema.dataset, path = %input_path.display(), error = ?e, "reading raw csv failed")
    })?;
    tracing::info!(
        dataset = %schema.dataset,
        rows = table.len(),
        columns = table.columns().len(),
        "raw table loaded"
    );

    let records = normalize(&table, schema);
    let dist = label_distribution(records.iter().map(|r| r.label.as_str()));
    tracing::info!(
        dataset = %schema.dataset,
        rows = records.len(),
        columns = 5,
        labels = ?dist,
        "dataset normalized"
    );
    Ok(records)
}

pub fn process_omdena_dataset(input_path: &Path) -> Result<Vec<NormalizedRecord>> {
    process_dataset(input_path, &OMDENA_SCHEMA)
}

pub fn process_posadas_dataset(input_path: &Path) -> Result<Vec<NormalizedRecord>> {
    process_dataset(input_path, &POSADAS_SCHEMA)
}

/// Persist normalized rows (header: label, content, title, source, dataset_source).
pub fn write_normalized(records: &[NormalizedRecord], path: &Path) -> Result<()> {
    crate::ingest::merge::write_records(records, &NormalizedRecord::COLUMNS, path)
}

pub fn read_normalized(path: &Path) -> Result<Vec<NormalizedRecord>> {
    crate::ingest::merge::read_records(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn title_is_first_eight_words_with_ellipsis() {
        assert_eq!(
            synthesize_title("one two three four five six seven eight nine ten"),
            "one two three four five six seven eight..."
        );
        assert_eq!(synthesize_title("corto y claro"), "corto y claro...");
        assert_eq!(synthesize_title("   "), "");
    }

    #[test]
    fn title_window_counts_raw_words_before_cleaning() {
        let mut t = Table::new(["corrected_label", "content"]);
        t.push_row(vec![
            s("fake"),
            s("https://a.b uno dos tres cuatro cinco seis siete ocho nueve"),
        ])
        .unwrap();
        t.push_row(vec![s("true"), s("uno dos tres")]).unwrap();
        t.push_row(vec![s("true"), None]).unwrap();

        let out = normalize(&t, &OMDENA_SCHEMA);
        assert_eq!(out[0].title, "uno dos tres cuatro cinco seis siete...");
        assert_eq!(out[0].content, "uno dos tres cuatro cinco seis siete ocho nueve");
        assert_eq!(out[1].title, "uno dos tres...");
        assert_eq!(out[2].title, DEFAULT_TITLE);
    }

    #[test]
    fn omdena_falls_back_to_prediction_and_synthesizes_title() {
        let mut t = Table::new(["prediction", "content", "split"]);
        t.push_row(vec![
            s(" Fake "),
            s("one two three four five six seven eight nine ten https://x.co/a"),
            s("train"),
        ])
        .unwrap();

        let out = normalize(&t, &OMDENA_SCHEMA);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "fake");
        assert_eq!(out[0].title, "one two three four five six seven eight...");
        assert_eq!(out[0].source, DEFAULT_SOURCE);
        assert_eq!(out[0].dataset_source, DatasetSource::Omdena);
    }

    #[test]
    fn corrected_label_wins_over_prediction() {
        let mut t = Table::new(["prediction", "corrected_label", "content", "title"]);
        t.push_row(vec![s("fake"), s("True"), s("x"), s("t")]).unwrap();
        assert_eq!(normalize(&t, &OMDENA_SCHEMA)[0].label, "true");
    }

    #[test]
    fn posadas_false_becomes_fake_and_defaults_apply() {
        let mut t = Table::new(["category", "text", "headline", "source"]);
        t.push_row(vec![s("False"), s("texto   con\nespacios"), None, None])
            .unwrap();
        t.push_row(vec![s("True"), s("otro"), s("Titular http://a.b"), s("El País")])
            .unwrap();

        let out = normalize(&t, &POSADAS_SCHEMA);
        assert_eq!(out[0].label, "fake");
        assert_eq!(out[0].content, "texto con espacios");
        assert_eq!(out[0].title, DEFAULT_TITLE);
        assert_eq!(out[0].source, DEFAULT_SOURCE);
        assert_eq!(out[1].label, "true");
        assert_eq!(out[1].title, "Titular");
        assert_eq!(out[1].source, "El País");
        assert!(out.iter().all(|r| r.dataset_source == DatasetSource::Posadas));
    }

    #[test]
    fn omdena_false_is_left_alone() {
        let mut t = Table::new(["corrected_label", "content", "title", "source"]);
        t.push_row(vec![s("false"), s("c"), s("t"), s("s")]).unwrap();
        assert_eq!(normalize(&t, &OMDENA_SCHEMA)[0].label, "false");
    }

    #[test]
    fn absent_label_and_content_become_empty() {
        let mut t = Table::new(["title"]);
        t.push_row(vec![s("solo titulo")]).unwrap();
        let out = normalize(&t, &OMDENA_SCHEMA);
        assert_eq!(out[0].label, "");
        assert_eq!(out[0].content, "");
        assert_eq!(out[0].title, "solo titulo");
    }
}
