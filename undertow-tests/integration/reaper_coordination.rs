//! The storage reaper against bundles with live sessions.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use undertow_core::config::StreamingConfig;
use undertow_core::source::{DirectoryContentSource, sample_magnet};
use undertow_core::storage::{ReapReport, StorageReaper};

use crate::common::{app_with, body_bytes, eventually, get, hash, movie, stream_uri};

#[tokio::test]
async fn test_reaper_spares_bundle_while_streaming() {
    let temp = tempfile::tempdir().unwrap();
    let busy = temp.path().join(hash(41).to_string());
    let idle = temp.path().join(hash(42).to_string());
    fs::create_dir_all(&busy).unwrap();
    fs::create_dir_all(&idle).unwrap();
    let data = movie(256 * 1024, 41);
    fs::write(busy.join("movie.mp4"), &data).unwrap();
    fs::write(idle.join("other.mp4"), movie(1024, 42)).unwrap();

    let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));
    let app = app_with(
        Arc::new(source),
        StreamingConfig {
            chunk_size: 1024,
            metadata_timeout: Duration::from_secs(2),
            channel_capacity: 1,
        },
    );
    let reaper = StorageReaper::new(temp.path(), Duration::from_secs(3600), app.leases.clone());

    // Headers are back but the body has not been read, so the session is parked mid-file.
    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(41), "busy")), None).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

    let report = reaper.reap_once().await;
    assert_eq!(
        report,
        ReapReport {
            removed: 1,
            skipped_active: 1,
            failed: 0
        }
    );
    assert!(busy.join("movie.mp4").is_file());
    assert!(!idle.exists());

    assert_eq!(body_bytes(response).await, data);
    assert!(eventually(|| !app.leases.is_leased(&hash(41).to_string())).await);

    let report = reaper.reap_once().await;
    assert_eq!(report.removed, 1);
    assert!(!busy.exists());
    assert!(temp.path().is_dir(), "storage root itself is kept");
}

#[tokio::test]
async fn test_reaped_bundle_is_simply_missing_for_new_requests() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = temp.path().join(hash(43).to_string());
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("movie.mp4"), movie(100, 43)).unwrap();

    let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));
    let app = app_with(
        Arc::new(source),
        StreamingConfig {
            chunk_size: 1024,
            metadata_timeout: Duration::from_millis(100),
            channel_capacity: 1,
        },
    );

    let reaper = StorageReaper::new(temp.path(), Duration::from_secs(3600), app.leases.clone());
    assert_eq!(reaper.reap_once().await.removed, 1);

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(43), "gone")), None).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}
