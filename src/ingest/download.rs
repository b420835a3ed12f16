// src/ingest/download.rs
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use metrics::counter;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::pipeline::DownloadSettings;
use crate::ingest::ensure_metrics_described;
use crate::ingest::table::ensure_parent_dir;

/// Bounded exponential backoff: attempt `k` (0-based) is followed by `base * 2^k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Total attempts made before giving up (never less than one).
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Destination already existed; nothing was fetched.
    Skipped,
    Downloaded { bytes: u64, attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed { .. })
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: Client,
    policy: RetryPolicy,
    chunk_size: usize,
    progress: bool,
}

impl Downloader {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("de-a-mentis/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .context("building download http client")?;
        Ok(Self {
            client,
            policy,
            chunk_size: 8 * 1024,
            progress: true,
        })
    }

    pub fn from_settings(s: &DownloadSettings) -> Result<Self> {
        Ok(Self::new(
            Duration::from_secs(s.timeout_secs),
            RetryPolicy::new(s.max_retries, Duration::from_millis(s.backoff_base_ms)),
        )?
        .with_chunk_size(s.chunk_size)
        .with_progress(s.progress))
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn with_progress(mut self, on: bool) -> Self {
        self.progress = on;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `url` into `dest`. Never returns an error: exhausted retries come back
    /// as `DownloadOutcome::Failed` so the caller decides whether that is fatal.
    pub async fn fetch(&self, url: &str, dest: &Path) -> DownloadOutcome {
        ensure_metrics_described();

        if dest.exists() {
            tracing::info!(path = %dest.display(), "file already exists, skipping download");
            counter!("download_skipped_total").increment(1);
            return DownloadOutcome::Skipped;
        }

        let attempts = self.policy.attempts();
        let mut last_error = String::new();
        for attempt in 0..attempts {
            counter!("download_attempts_total").increment(1);
            match self.try_once(url, dest).await {
                Ok(bytes) => {
                    tracing::info!(url, path = %dest.display(), bytes, "download complete");
                    return DownloadOutcome::Downloaded {
                        bytes,
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    last_error = format!("{e:#}");
                    if attempt + 1 < attempts {
                        let delay = self.policy.delay_for(attempt);
                        tracing::warn!(
                            url,
                            attempt = attempt + 1,
                            max_retries = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "download attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        tracing::error!(
            url,
            path = %dest.display(),
            attempts,
            error = %last_error,
            "download failed after all retries"
        );
        counter!("download_failures_total").increment(1);
        DownloadOutcome::Failed {
            attempts,
            last_error,
        }
    }

    async fn try_once(&self, url: &str, dest: &Path) -> Result<u64> {
        ensure_parent_dir(dest)?;
        let part = part_path(dest);

        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .map_err(|e| anyhow!("GET {url}: {e}"))?;

        let pb = self.progress_bar(resp.content_length(), dest);

        let file = fs::File::create(&part)
            .await
            .with_context(|| format!("creating {}", part.display()))?;
        let mut out = BufWriter::with_capacity(self.chunk_size, file);

        let mut written = 0u64;
        let streamed: Result<()> = async {
            while let Some(chunk) = resp
                .chunk()
                .await
                .with_context(|| format!("reading body of {url}"))?
            {
                out.write_all(&chunk)
                    .await
                    .with_context(|| format!("writing {}", part.display()))?;
                written += chunk.len() as u64;
                pb.set_position(written);
            }
            out.flush()
                .await
                .with_context(|| format!("flushing {}", part.display()))?;
            Ok(())
        }
        .await;
        drop(out);

        if let Err(e) = streamed {
            pb.abandon();
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }
        pb.finish_and_clear();

        fs::rename(&part, dest)
            .await
            .with_context(|| format!("moving {} into place", part.display()))?;
        counter!("download_bytes_total").increment(written);
        Ok(written)
    }

    fn progress_bar(&self, total: Option<u64>, dest: &Path) -> ProgressBar {
        let pb = match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {bytes}") {
                    pb.set_style(style);
                }
                pb
            }
        };
        if !self.progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        pb.set_message(name);
        pb
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_never_decreases() {
        let p = RetryPolicy::new(5, Duration::from_millis(100));
        let delays: Vec<_> = (0..5).map(|a| p.delay_for(a)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[4], Duration::from_millis(1600));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn huge_attempt_saturates() {
        let p = RetryPolicy::new(3, Duration::from_secs(1));
        assert!(p.delay_for(40) >= p.delay_for(31));
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(RetryPolicy::new(3, Duration::ZERO).attempts(), 3);
    }

    #[test]
    fn part_file_sits_next_to_destination() {
        let p = part_path(Path::new("data/raw/train.xlsx"));
        assert_eq!(p, Path::new("data/raw/train.xlsx.part"));
    }
}
