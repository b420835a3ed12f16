// src/cli/mod.rs
//! Command-line surface. Each subcommand resolves paths against the pipeline
//! config and hands off to `crate::ingest`; nothing here touches data directly.

pub mod commands;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::pipeline::{omdena_raw_csv_under, PipelineConfig, POSADAS_FILE, POSADAS_SUBDIR};
use crate::ingest::download::Downloader;
use crate::ingest::merge::merge_datasets;
use crate::ingest::normalize::{process_omdena_dataset, process_posadas_dataset, write_normalized};
use crate::ingest::providers::omdena::{download_omdena, DatasetsServerHub};
use crate::ingest::providers::posadas::{download_posadas, XlsxLoader};
use crate::ingest::types::NormalizedRecord;
use commands::{Commands, DownloadOmdenaArgs, DownloadPosadasArgs, MergeArgs, ProcessArgs};

#[derive(Parser, Debug)]
#[command(
    name = "de-a-mentis",
    version,
    about = "Download, normalize and merge Spanish fake-news datasets."
)]
pub struct Cli {
    /// Pipeline config (TOML). Defaults to $DE_A_MENTIS_CONFIG, then config/pipeline.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON log lines instead of compact text
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn load_config(&self) -> Result<PipelineConfig> {
        match &self.config {
            Some(p) => PipelineConfig::load_from(p),
            None => PipelineConfig::load_default(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let cfg = self.load_config()?;
        match self.command {
            Commands::DownloadOmdena(args) => run_download_omdena(&cfg, args).await,
            Commands::DownloadPosadas(args) => run_download_posadas(&cfg, args).await,
            Commands::ProcessOmdenaDataset(args) => {
                let input = args.input_path.clone().unwrap_or_else(|| cfg.paths.omdena_raw_csv());
                let records = process_omdena_dataset(&input)?;
                maybe_write(&records, args)
            }
            Commands::ProcessPosadasDataset(args) => {
                let input = args.input_path.clone().unwrap_or_else(|| cfg.paths.posadas_raw_csv());
                let records = process_posadas_dataset(&input)?;
                maybe_write(&records, args)
            }
            Commands::MergeDatasets(args) => run_merge(&cfg, args),
            Commands::DownloadAll(args) => {
                let root = args.output_dir.unwrap_or_else(|| cfg.paths.raw_dir.clone());
                run_download_omdena(
                    &cfg,
                    DownloadOmdenaArgs {
                        output_path: Some(omdena_raw_csv_under(&root)),
                        cache_dir: None,
                    },
                )
                .await?;
                run_download_posadas(
                    &cfg,
                    DownloadPosadasArgs {
                        output_dir: Some(root.join(POSADAS_SUBDIR)),
                        output_file: None,
                        keep_excel: false,
                        no_keep_excel: false,
                    },
                )
                .await
            }
            Commands::ProcessAll => run_merge(
                &cfg,
                MergeArgs {
                    posadas_path: None,
                    omdena_path: None,
                    output_path: None,
                },
            ),
        }
    }
}

async fn run_download_omdena(cfg: &PipelineConfig, args: DownloadOmdenaArgs) -> Result<()> {
    let output = args.output_path.unwrap_or_else(|| cfg.paths.omdena_raw_csv());
    let cache = args.cache_dir.or_else(|| cfg.omdena.cache_dir.clone());
    let hub = DatasetsServerHub::from_settings(&cfg.omdena).with_cache_dir(cache);
    download_omdena(&hub, &cfg.omdena.dataset, &cfg.omdena.splits, &output).await?;
    Ok(())
}

async fn run_download_posadas(cfg: &PipelineConfig, args: DownloadPosadasArgs) -> Result<()> {
    let keep_excel = args.keep_excel().unwrap_or(cfg.posadas.keep_excel);
    let output_dir = args.output_dir.unwrap_or_else(|| cfg.paths.posadas_dir());
    let output_file = args.output_file.unwrap_or_else(|| POSADAS_FILE.to_string());

    let downloader = Downloader::from_settings(&cfg.download)?;
    let fetch = download_posadas(
        &downloader,
        &XlsxLoader,
        &cfg.posadas.ordered_sources(),
        &output_dir,
        &output_file,
        keep_excel,
    )
    .await?;
    if fetch.is_empty() {
        bail!("no posadas split could be downloaded into {}", output_dir.display());
    }
    Ok(())
}

fn run_merge(cfg: &PipelineConfig, args: MergeArgs) -> Result<()> {
    let posadas = args.posadas_path.unwrap_or_else(|| cfg.paths.posadas_raw_csv());
    let omdena = args.omdena_path.unwrap_or_else(|| cfg.paths.omdena_raw_csv());
    let output = args.output_path.unwrap_or_else(|| cfg.paths.merged_csv());
    merge_datasets(&posadas, &omdena, &output)?;
    Ok(())
}

fn maybe_write(records: &[NormalizedRecord], args: ProcessArgs) -> Result<()> {
    if let Some(out) = args.output_path.as_deref() {
        write_normalized(records, out)?;
        tracing::info!(path = %out.display(), rows = records.len(), "normalized dataset written");
    }
    Ok(())
}
