// tests/common/mod.rs
#![allow(dead_code)]

use axum::Router;
use de_a_mentis::ingest::download::{Downloader, RetryPolicy};
use std::time::Duration;

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

/// Quiet downloader with a short backoff so retry tests stay fast.
pub fn test_downloader(max_retries: u32, backoff_ms: u64) -> Downloader {
    Downloader::new(
        Duration::from_secs(5),
        RetryPolicy::new(max_retries, Duration::from_millis(backoff_ms)),
    )
    .expect("downloader")
    .with_progress(false)
}
