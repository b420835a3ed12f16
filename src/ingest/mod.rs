// src/ingest/mod.rs
pub mod download;
pub mod merge;
pub mod normalize;
pub mod providers;
pub mod table;
pub mod types;

use metrics::describe_counter;
use once_cell::sync::OnceCell;
use regex::Regex;

/// One-time metrics registration so the series carry descriptions once a recorder is installed.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "download_attempts_total",
            "HTTP download attempts, including retries."
        );
        describe_counter!(
            "download_failures_total",
            "Downloads that exhausted every retry."
        );
        describe_counter!(
            "download_skipped_total",
            "Downloads skipped because the destination already existed."
        );
        describe_counter!("download_bytes_total", "Bytes written by the downloader.");
        describe_counter!(
            "pipeline_rows_written_total",
            "Rows written to raw, normalized or merged CSV files."
        );
    });
}

fn url_regex() -> &'static Regex {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    RE_URL.get_or_init(|| Regex::new(r"https?://\S*").unwrap())
}

fn ws_regex() -> &'static Regex {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Clean a free-text cell: drop URLs, collapse whitespace, trim.
/// Missing input yields an empty string.
pub fn clean_text(s: Option<&str>) -> String {
    let Some(s) = s else {
        return String::new();
    };
    let out = url_regex().replace_all(s, "");
    let out = ws_regex().replace_all(&out, " ");
    out.trim().to_string()
}

/// Render a JSON scalar the way it would appear in a CSV cell.
/// `null` is missing; strings pass through untouched; everything else uses its JSON form.
pub fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `clean_text` over an arbitrary JSON value. Only strings carry text; every other
/// value (null, numbers, bools, containers) cleans to an empty string.
pub fn clean_value(v: &serde_json::Value) -> String {
    clean_text(v.as_str())
}
