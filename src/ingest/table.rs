// src/ingest/table.rs
//! Loosely-typed string table used for raw, source-native rows.
//!
//! Cells are `Option<String>`: `None` is a missing value (empty CSV field,
//! empty spreadsheet cell, JSON `null`).

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Short rows are padded with missing cells; long rows are rejected.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) -> Result<()> {
        if row.len() > self.columns.len() {
            return Err(anyhow!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        row.resize(self.columns.len(), None);
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Values of one column, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    /// Trim and lower-case every column name. Names that collide after
    /// normalization are kept but logged; lookups resolve to the first one.
    pub fn normalize_column_names(&mut self) {
        for c in &mut self.columns {
            *c = c.trim().to_lowercase();
        }
        for dup in self.duplicate_columns() {
            tracing::warn!(column = %dup, "duplicate column after normalizing names, later ones are shadowed");
        }
    }

    /// Column names that appear more than once, in first-seen order.
    pub fn duplicate_columns(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups: Vec<&str> = Vec::new();
        for c in &self.columns {
            if !seen.insert(c.as_str()) && !dups.contains(&c.as_str()) {
                dups.push(c);
            }
        }
        dups
    }

    /// Set `name` to `value` on every row, adding the column when absent.
    pub fn set_constant_column(&mut self, name: &str, value: &str) {
        let idx = match self.column_index(name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                for r in &mut self.rows {
                    r.push(None);
                }
                self.columns.len() - 1
            }
        };
        for r in &mut self.rows {
            r[idx] = Some(value.to_string());
        }
    }

    /// Stack tables vertically. The result carries the union of all columns in
    /// first-seen order; a table lacking a column contributes missing cells.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let tables: Vec<Table> = tables.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let total = tables.iter().map(Table::len).sum();
        let mut rows = Vec::with_capacity(total);
        for t in tables {
            let mapping: Vec<Option<usize>> =
                columns.iter().map(|c| t.column_index(c)).collect();
            for mut r in t.rows {
                let out = mapping
                    .iter()
                    .map(|m| m.and_then(|i| r.get_mut(i).and_then(Option::take)))
                    .collect();
                rows.push(out);
            }
        }
        Table { columns, rows }
    }

    pub fn read_csv(path: &Path) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening csv {}", path.display()))?;

        let headers = rdr
            .headers()
            .with_context(|| format!("reading csv header from {}", path.display()))?
            .clone();
        let mut table = Table::new(headers.iter());

        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("reading csv row {} of {}", i + 1, path.display()))?;
            let row = rec
                .iter()
                .map(|f| if f.is_empty() { None } else { Some(f.to_string()) })
                .collect();
            table
                .push_row(row)
                .with_context(|| format!("csv row {} of {}", i + 1, path.display()))?;
        }
        Ok(table)
    }

    /// Write with a header row, creating parent directories and overwriting any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating csv {}", path.display()))?;
        wtr.write_record(&self.columns)
            .with_context(|| format!("writing csv header to {}", path.display()))?;
        for r in &self.rows {
            wtr.write_record(r.iter().map(|c| c.as_deref().unwrap_or("")))
                .with_context(|| format!("writing csv row to {}", path.display()))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing csv {}", path.display()))?;
        metrics::counter!("pipeline_rows_written_total").increment(self.rows.len() as u64);
        Ok(())
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}
