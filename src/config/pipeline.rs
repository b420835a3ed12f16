// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "DE_A_MENTIS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";

pub const OMDENA_SUBDIR: &str = "omdena";
pub const OMDENA_FILE: &str = "fake_news_latam_omdena_combined.csv";
pub const POSADAS_SUBDIR: &str = "FakeNewsCorpusSpanish";
pub const POSADAS_FILE: &str = "fake_news_corpus_posadas_full.csv";
pub const MERGED_FILE: &str = "fake_news_merged.csv";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: DataPaths,
    pub download: DownloadSettings,
    pub omdena: HubSettings,
    pub posadas: SpreadsheetSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DataPaths {
    pub raw_dir: PathBuf,
    pub interim_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            interim_dir: PathBuf::from("data/interim"),
        }
    }
}

impl DataPaths {
    pub fn omdena_raw_csv(&self) -> PathBuf {
        omdena_raw_csv_under(&self.raw_dir)
    }

    pub fn posadas_dir(&self) -> PathBuf {
        self.raw_dir.join(POSADAS_SUBDIR)
    }

    pub fn posadas_raw_csv(&self) -> PathBuf {
        self.posadas_dir().join(POSADAS_FILE)
    }

    pub fn merged_csv(&self) -> PathBuf {
        self.interim_dir.join(MERGED_FILE)
    }
}

pub fn omdena_raw_csv_under(root: &Path) -> PathBuf {
    root.join(OMDENA_SUBDIR).join(OMDENA_FILE)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub chunk_size: usize,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1_000,
            chunk_size: 8 * 1024,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HubSettings {
    pub dataset: String,
    /// datasets-server config name ("default" for single-config datasets).
    pub config: String,
    pub splits: Vec<String>,
    pub endpoint: String,
    pub page_size: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            dataset: "IsaacRodgz/Fake-news-latam-omdena".to_string(),
            config: "default".to_string(),
            splits: vec!["train".to_string(), "test".to_string()],
            endpoint: "https://datasets-server.huggingface.co".to_string(),
            page_size: 100,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpreadsheetSettings {
    /// split name -> workbook URL
    pub sources: BTreeMap<String, String>,
    pub keep_excel: bool,
}

impl Default for SpreadsheetSettings {
    fn default() -> Self {
        let base = "https://github.com/jpposadas/FakeNewsCorpusSpanish/raw/master";
        let sources = [
            ("train", "train.xlsx"),
            ("test", "test.xlsx"),
            ("dev", "development.xlsx"),
        ]
        .into_iter()
        .map(|(split, file)| (split.to_string(), format!("{base}/{file}")))
        .collect();
        Self {
            sources,
            keep_excel: false,
        }
    }
}

impl SpreadsheetSettings {
    /// Sources in pipeline order: train, test, dev, then any extra splits alphabetically.
    pub fn ordered_sources(&self) -> Vec<(String, String)> {
        const ORDER: [&str; 3] = ["train", "test", "dev"];
        let mut out: Vec<(String, String)> = ORDER
            .iter()
            .filter_map(|s| self.sources.get(*s).map(|u| (s.to_string(), u.clone())))
            .collect();
        out.extend(
            self.sources
                .iter()
                .filter(|(k, _)| !ORDER.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        out
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingSettings {
    /// MLflow tracking server; falls back to $MLFLOW_TRACKING_URI, then localhost.
    pub uri: Option<String>,
}

impl TrackingSettings {
    pub fn resolve_uri(&self) -> String {
        self.uri
            .clone()
            .or_else(|| std::env::var(ENV_TRACKING_URI).ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "http://127.0.0.1:5000".to_string())
    }
}

impl PipelineConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $DE_A_MENTIS_CONFIG
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
[paths]
raw_dir = "/tmp/raw"

[download]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.paths.raw_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(cfg.paths.interim_dir, PathBuf::from("data/interim"));
        assert_eq!(cfg.download.max_retries, 5);
        assert_eq!(cfg.download.timeout_secs, 30);
        assert_eq!(cfg.omdena.splits, vec!["train", "test"]);
    }

    #[test]
    fn default_paths_follow_layout() {
        let p = DataPaths::default();
        assert_eq!(
            p.omdena_raw_csv(),
            PathBuf::from("data/raw/omdena/fake_news_latam_omdena_combined.csv")
        );
        assert_eq!(
            p.posadas_raw_csv(),
            PathBuf::from("data/raw/FakeNewsCorpusSpanish/fake_news_corpus_posadas_full.csv")
        );
        assert_eq!(p.merged_csv(), PathBuf::from("data/interim/fake_news_merged.csv"));
    }

    #[test]
    fn spreadsheet_sources_keep_pipeline_order() {
        let s = SpreadsheetSettings::default();
        let names: Vec<_> = s.ordered_sources().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["train", "test", "dev"]);
        assert!(s.sources["dev"].ends_with("development.xlsx"));
    }
}
