// src/ingest/providers/omdena.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::pipeline::HubSettings;
use crate::ingest::scalar_to_string;
use crate::ingest::table::Table;
use crate::ingest::types::DatasetHub;

/// Rows page returned by datasets-server `/rows`.
#[derive(Debug, Deserialize)]
struct RowsPage {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: serde_json::Map<String, serde_json::Value>,
}

/// Hugging Face hub client backed by the datasets-server REST API.
pub struct DatasetsServerHub {
    client: Client,
    endpoint: String,
    config: String,
    page_size: usize,
    cache_dir: Option<PathBuf>,
}

impl DatasetsServerHub {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            config: "default".to_string(),
            page_size: 100,
            cache_dir: None,
        }
    }

    pub fn from_settings(s: &HubSettings) -> Self {
        Self::new(s.endpoint.clone())
            .with_config(s.config.clone())
            .with_page_size(s.page_size)
            .with_cache_dir(s.cache_dir.clone())
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// datasets-server caps `length` at 100.
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.clamp(1, 100);
        self
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    fn cache_path(&self, dataset: &str, split: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|d| d.join(dataset.replace('/', "__")).join(format!("{split}.csv")))
    }

    async fn fetch_page(&self, dataset: &str, split: &str, offset: usize) -> Result<RowsPage> {
        let url = format!("{}/rows", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("dataset", dataset),
                ("config", self.config.as_str()),
                ("split", split),
            ])
            .query(&[("offset", offset), ("length", self.page_size)])
            .send()
            .await
            .with_context(|| format!("querying {url} for {dataset}/{split}"))?
            .error_for_status()
            .map_err(|e| anyhow!("datasets-server rows {dataset}/{split}: {e}"))?;
        resp.json::<RowsPage>()
            .await
            .with_context(|| format!("decoding rows page for {dataset}/{split} at offset {offset}"))
    }

    async fn fetch_split(&self, dataset: &str, split: &str) -> Result<Table> {
        let mut table: Option<Table> = None;
        let mut offset = 0usize;
        loop {
            let page = self.fetch_page(dataset, split, offset).await?;
            let t = table.get_or_insert_with(|| Table::new(page.features.iter().map(|f| f.name.clone())));
            let n = page.rows.len();
            for entry in page.rows {
                let row = t
                    .columns()
                    .iter()
                    .map(|c| entry.row.get(c).and_then(scalar_to_string))
                    .collect();
                t.push_row(row)?;
            }
            offset += n;
            tracing::debug!(dataset, split, offset, total = page.num_rows_total, "rows page");
            if n == 0 || offset >= page.num_rows_total {
                break;
            }
        }
        Ok(table.unwrap_or_default())
    }
}

#[async_trait]
impl DatasetHub for DatasetsServerHub {
    async fn load_split(&self, dataset: &str, split: &str) -> Result<Table> {
        let cached = self.cache_path(dataset, split);
        if let Some(p) = cached.as_deref().filter(|p| p.exists()) {
            tracing::info!(dataset, split, path = %p.display(), "using cached split");
            return Table::read_csv(p);
        }

        let table = self.fetch_split(dataset, split).await?;
        if let Some(p) = cached {
            table.write_csv(&p)?;
        }
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

/// Pull every split of a hub dataset, tag rows with their split and write one raw CSV.
/// Overwrites `output_path`. Errors are logged and propagated.
pub async fn download_omdena(
    hub: &dyn DatasetHub,
    dataset: &str,
    splits: &[String],
    output_path: &Path,
) -> Result<Table> {
    tracing::info!(dataset, hub = hub.name(), "downloading hub dataset");

    let mut parts = Vec::with_capacity(splits.len());
    for split in splits {
        let mut t = match hub.load_split(dataset, split).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(dataset, split = %split, error = ?e, "hub fetch failed");
                return Err(e.context(format!("loading {dataset} split {split}")));
            }
        };
        tracing::info!(dataset, split = %split, rows = t.len(), "split loaded");
        t.set_constant_column("split", split);
        parts.push(t);
    }

    let mut combined = Table::concat(parts);
    combined.normalize_column_names();

    if let Err(e) = combined.write_csv(output_path) {
        tracing::error!(path = %output_path.display(), error = ?e, "writing omdena csv failed");
        return Err(e);
    }
    tracing::info!(
        path = %output_path.display(),
        rows = combined.len(),
        "saved combined omdena dataset"
    );
    Ok(combined)
}
