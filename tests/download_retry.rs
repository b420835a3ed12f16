// tests/download_retry.rs
mod common;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use de_a_mentis::ingest::download::DownloadOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
struct Flaky {
    hits: Arc<AtomicUsize>,
    fail_first: usize,
}

async fn flaky_file(State(s): State<Flaky>) -> (StatusCode, &'static str) {
    let n = s.hits.fetch_add(1, Ordering::SeqCst);
    if n < s.fail_first {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    } else {
        (StatusCode::OK, "payload-bytes")
    }
}

async fn flaky_server(fail_first: usize) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/file", get(flaky_file)).with_state(Flaky {
        hits: hits.clone(),
        fail_first,
    });
    (common::serve(app).await, hits)
}

#[tokio::test]
async fn second_fetch_is_skipped_without_network() {
    let (base, hits) = flaky_server(0).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a/b/train.xlsx");
    let dl = common::test_downloader(3, 5);

    let first = dl.fetch(&format!("{base}/file"), &dest).await;
    assert!(matches!(first, DownloadOutcome::Downloaded { attempts: 1, .. }));
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "payload-bytes");

    let second = dl.fetch(&format!("{base}/file"), &dest).await;
    assert_eq!(second, DownloadOutcome::Skipped);
    assert!(second.is_success());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn always_failing_source_gets_exactly_max_retries_attempts() {
    let (base, hits) = flaky_server(usize::MAX).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("dev.xlsx");
    let dl = common::test_downloader(3, 20);

    let started = Instant::now();
    let out = dl.fetch(&format!("{base}/file"), &dest).await;
    let elapsed = started.elapsed();

    match out {
        DownloadOutcome::Failed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    // 20ms + 40ms between the three attempts, nothing after the last one.
    assert!(elapsed.as_millis() >= 60, "elapsed {elapsed:?}");
    assert!(!dest.exists());
    assert!(!dir.path().join("dev.xlsx.part").exists());
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let (base, hits) = flaky_server(2).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("test.xlsx");
    let dl = common::test_downloader(3, 5);

    let out = dl.fetch(&format!("{base}/file"), &dest).await;
    assert_eq!(
        out,
        DownloadOutcome::Downloaded {
            bytes: "payload-bytes".len() as u64,
            attempts: 3
        }
    );
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unreachable_host_fails_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("x.xlsx");
    let dl = common::test_downloader(2, 1);

    // Port 9 (discard) is almost never listening on localhost.
    let out = dl.fetch("http://127.0.0.1:9/nothing", &dest).await;
    assert!(!out.is_success());
    assert!(!dest.exists());
}
