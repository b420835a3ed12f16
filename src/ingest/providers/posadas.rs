// src/ingest/providers/posadas.rs
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::download::Downloader;
use crate::ingest::table::Table;
use crate::ingest::types::SheetLoader;

/// Reads the first worksheet of an `.xlsx` workbook; the first row is the header.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxLoader;

impl SheetLoader for XlsxLoader {
    fn load(&self, path: &Path) -> Result<Table> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("opening workbook {}", path.display()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("no worksheet found in {}", path.display()))?
            .with_context(|| format!("reading first worksheet of {}", path.display()))?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Table::default());
        };
        let mut table = Table::new(header.iter().map(|c| cell_to_string(c).unwrap_or_default()));
        for row in rows {
            let cells: Vec<Option<String>> = row.iter().map(cell_to_string).collect();
            if cells.iter().all(Option::is_none) {
                continue;
            }
            table.push_row(cells)?;
        }
        Ok(table)
    }
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        other => Some(other.to_string()),
    }
}

/// How much of the spreadsheet corpus made it into the combined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    /// Some splits failed to download or parse; the rest were combined.
    Partial { failed: Vec<String> },
    /// Nothing usable; no output was written.
    Empty,
}

#[derive(Debug, Clone)]
pub struct SpreadsheetFetch {
    pub status: FetchStatus,
    pub table: Option<Table>,
    pub output: Option<PathBuf>,
}

impl SpreadsheetFetch {
    pub fn is_empty(&self) -> bool {
        matches!(self.status, FetchStatus::Empty)
    }
}

/// Download each `(split, url)` workbook, combine the non-empty ones and write a raw CSV.
///
/// Per-split failures are logged and skipped. Only writing the combined CSV can
/// fail the call; an all-failed run returns `FetchStatus::Empty`.
pub async fn download_posadas(
    downloader: &Downloader,
    loader: &dyn SheetLoader,
    sources: &[(String, String)],
    output_dir: &Path,
    output_file: &str,
    keep_excel: bool,
) -> Result<SpreadsheetFetch> {
    tracing::info!(dir = %output_dir.display(), "downloading posadas workbooks");

    let mut failed = Vec::new();
    let mut parts = Vec::new();
    let mut workbooks = Vec::new();

    for (split, url) in sources {
        let dest = output_dir.join(format!("{split}.xlsx"));
        tracing::info!(split = %split, url = %url, "downloading split");
        let outcome = downloader.fetch(url, &dest).await;
        if !outcome.is_success() {
            tracing::warn!(split = %split, url = %url, "split download failed, continuing");
            failed.push(split.clone());
            continue;
        }
        workbooks.push(dest.clone());

        let mut t = match loader.load(&dest) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(split = %split, path = %dest.display(), error = ?e, "reading workbook failed, continuing");
                failed.push(split.clone());
                continue;
            }
        };
        if t.is_empty() {
            tracing::warn!(split = %split, path = %dest.display(), "workbook has no rows, skipping");
            continue;
        }
        t.normalize_column_names();
        t.set_constant_column("split", split);
        tracing::info!(split = %split, rows = t.len(), "split loaded");
        parts.push(t);
    }

    if parts.is_empty() {
        tracing::error!(
            failed = ?failed,
            "no posadas split could be loaded; nothing written"
        );
        return Ok(SpreadsheetFetch {
            status: FetchStatus::Empty,
            table: None,
            output: None,
        });
    }

    let combined = Table::concat(parts);
    let output = output_dir.join(output_file);
    combined
        .write_csv(&output)
        .inspect_err(|e| tracing::error!(path = %output.display(), error = ?e, "writing posadas csv failed"))?;
    tracing::info!(path = %output.display(), rows = combined.len(), "saved full posadas dataset");

    if !keep_excel {
        for wb in &workbooks {
            match fs::remove_file(wb) {
                Ok(()) => tracing::debug!(path = %wb.display(), "removed workbook"),
                Err(e) => tracing::warn!(path = %wb.display(), error = %e, "could not remove workbook"),
            }
        }
    }

    let status = if failed.is_empty() {
        FetchStatus::Complete
    } else {
        tracing::warn!(failed = ?failed, "posadas dataset is partial");
        FetchStatus::Partial { failed }
    };
    Ok(SpreadsheetFetch {
        status,
        table: Some(combined),
        output: Some(output),
    })
}
