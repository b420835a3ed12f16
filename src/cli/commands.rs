// src/cli/commands.rs
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the Omdena LATAM corpus from the Hugging Face hub
    DownloadOmdena(DownloadOmdenaArgs),

    /// Download the Posadas FakeNewsCorpusSpanish workbooks from GitHub
    DownloadPosadas(DownloadPosadasArgs),

    /// Normalize the raw Omdena CSV
    ProcessOmdenaDataset(ProcessArgs),

    /// Normalize the raw Posadas CSV
    ProcessPosadasDataset(ProcessArgs),

    /// Normalize both corpora and write the merged CSV
    MergeDatasets(MergeArgs),

    /// Download both corpora
    DownloadAll(DownloadAllArgs),

    /// Normalize and merge using the configured default paths
    ProcessAll,
}

#[derive(Args, Debug)]
pub struct DownloadOmdenaArgs {
    /// Destination CSV (default: <raw_dir>/omdena/fake_news_latam_omdena_combined.csv)
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Cache fetched splits here and reuse them on later runs
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DownloadPosadasArgs {
    /// Directory for the workbooks and the combined CSV
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Name of the combined CSV inside the output directory
    #[arg(long)]
    pub output_file: Option<String>,

    /// Keep the downloaded .xlsx files
    #[arg(long, overrides_with = "no_keep_excel")]
    pub keep_excel: bool,

    /// Delete the downloaded .xlsx files after combining (default)
    #[arg(long, overrides_with = "keep_excel")]
    pub no_keep_excel: bool,
}

impl DownloadPosadasArgs {
    /// `None` when neither flag was given.
    pub fn keep_excel(&self) -> Option<bool> {
        match (self.keep_excel, self.no_keep_excel) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Raw CSV to normalize (default: the configured raw path)
    #[arg(long)]
    pub input_path: Option<PathBuf>,

    /// Also write the normalized rows here
    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[arg(long)]
    pub posadas_path: Option<PathBuf>,

    #[arg(long)]
    pub omdena_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DownloadAllArgs {
    /// Root for both raw datasets (default: the configured raw_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}
