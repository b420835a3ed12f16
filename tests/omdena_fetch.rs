// tests/omdena_fetch.rs
mod common;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use de_a_mentis::ingest::providers::omdena::{download_omdena, DatasetsServerHub};
use de_a_mentis::ingest::table::Table;
use de_a_mentis::ingest::types::DatasetHub;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Deserialize)]
struct RowsQuery {
    dataset: String,
    split: String,
    offset: usize,
    length: usize,
}

fn split_rows(split: &str) -> Vec<Value> {
    match split {
        "train" => vec![
            json!({"Title": "Uno", "Content": "Texto uno", "Corrected_Label": "Fake", "Source": "X"}),
            json!({"Title": "Dos", "Content": "Texto dos", "Corrected_Label": "True", "Source": null}),
            json!({"Title": "Tres", "Content": "Texto tres", "Corrected_Label": "fake", "Source": "Y"}),
        ],
        "test" => vec![
            json!({"Title": "Cuatro", "Content": "Texto cuatro", "Corrected_Label": 1, "Source": "Z"}),
        ],
        _ => vec![],
    }
}

async fn rows(
    State(hits): State<Arc<AtomicUsize>>,
    Query(q): Query<RowsQuery>,
) -> Result<Json<Value>, StatusCode> {
    hits.fetch_add(1, Ordering::SeqCst);
    if q.dataset != "org/fake-news" {
        return Err(StatusCode::NOT_FOUND);
    }
    let all = split_rows(&q.split);
    let page: Vec<Value> = all
        .iter()
        .enumerate()
        .skip(q.offset)
        .take(q.length)
        .map(|(i, r)| json!({"row_idx": i, "row": r, "truncated_cells": []}))
        .collect();
    Ok(Json(json!({
        "features": [
            {"feature_idx": 0, "name": "Title", "type": {"dtype": "string"}},
            {"feature_idx": 1, "name": "Content", "type": {"dtype": "string"}},
            {"feature_idx": 2, "name": "Corrected_Label", "type": {"dtype": "string"}},
            {"feature_idx": 3, "name": "Source", "type": {"dtype": "string"}}
        ],
        "rows": page,
        "num_rows_total": all.len(),
        "num_rows_per_page": 100,
        "partial": false
    })))
}

async fn hub_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/rows", get(rows)).with_state(hits.clone());
    (common::serve(app).await, hits)
}

fn splits() -> Vec<String> {
    vec!["train".into(), "test".into()]
}

#[tokio::test]
async fn pages_through_splits_and_writes_tagged_csv() {
    let (base, hits) = hub_server().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("omdena/combined.csv");
    let hub = DatasetsServerHub::new(base).with_page_size(2);

    let table = download_omdena(&hub, "org/fake-news", &splits(), &out)
        .await
        .expect("download ok");

    // train: 2 pages of 2, test: 1 page.
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(table.len(), 4);
    assert_eq!(
        table.columns(),
        ["title", "content", "corrected_label", "source", "split"]
    );
    assert_eq!(
        table.column("split").unwrap(),
        vec![Some("train"), Some("train"), Some("train"), Some("test")]
    );
    // nulls stay missing, numbers are stringified
    assert_eq!(table.cell(1, 3), None);
    assert_eq!(table.cell(3, 2), Some("1"));

    assert_eq!(Table::read_csv(&out).unwrap(), table);
}

#[tokio::test]
async fn cache_dir_short_circuits_second_run() {
    let (base, hits) = hub_server().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let hub = DatasetsServerHub::new(base).with_cache_dir(Some(cache.clone()));

    let first = hub.load_split("org/fake-news", "train").await.unwrap();
    let after_first = hits.load(Ordering::SeqCst);
    assert!(cache.join("org__fake-news").join("train.csv").exists());

    let second = hub.load_split("org/fake-news", "train").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), after_first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn hub_errors_propagate() {
    let (base, _hits) = hub_server().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.csv");
    let hub = DatasetsServerHub::new(base);

    let err = download_omdena(&hub, "org/unknown", &splits(), &out).await;
    assert!(err.is_err());
    assert!(!out.exists());
}
