// tests/metrics.rs
//
// Recorder is process-global, so everything lives in one test.

mod common;

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt as _;

use news_sync::metrics::Metrics;
use news_sync::{SyncOrchestrator, SyncSettings};

use common::{hours_ago, run_entry, MockStore, StaticSource};

#[tokio::test]
async fn sync_series_are_exposed_after_a_run() {
    let m = Metrics::init().expect("install recorder");
    assert!(Metrics::init().is_err(), "second install must fail");

    let source = StaticSource(vec![run_entry(json!(1), hours_ago(1), &[("https://l/a", "A", "da")])]);
    let orch = SyncOrchestrator::new(
        Arc::new(source),
        Arc::new(MockStore::accepting(&[])),
        SyncSettings::default(),
    );
    orch.run_once().await.unwrap();

    let resp = m
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = String::from_utf8(
        body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();

    assert!(text.contains("sync_runs_total"));
    assert!(text.contains("sync_inserted_total"));
    assert!(text.contains("sync_last_success_ts"));
    assert!(text.contains("sync_run_ms"));
    // Timing series render as histograms with the millisecond buckets.
    assert!(text.contains(r#"sync_run_ms_bucket{le="5"}"#));
    assert!(text.contains(r#"sync_run_ms_bucket{le="30000"}"#));
}
