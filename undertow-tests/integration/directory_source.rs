//! Streaming out of bundles laid out on disk as `<root>/<info hash>/...`.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use undertow_core::config::StreamingConfig;
use undertow_core::source::{DirectoryContentSource, sample_magnet};

use crate::common::{TestApp, app_with, body_bytes, get, hash, header_value, movie, stream_uri};

fn directory_app(root: &Path, metadata_timeout: Duration) -> TestApp {
    let source = DirectoryContentSource::new(root, Duration::from_millis(10));
    app_with(
        Arc::new(source),
        StreamingConfig {
            chunk_size: 8192,
            metadata_timeout,
            channel_capacity: 2,
        },
    )
}

#[tokio::test]
async fn test_streams_largest_video_from_nested_bundle() {
    let temp = tempfile::tempdir().unwrap();
    let bundle = temp.path().join(hash(31).to_string());
    fs::create_dir_all(bundle.join("Season 1/Extras")).unwrap();

    let episode = movie(120_000, 31);
    fs::write(bundle.join("Season 1/episode.mkv"), &episode).unwrap();
    fs::write(bundle.join("Season 1/Extras/making-of.mp4"), movie(40_000, 1)).unwrap();
    fs::write(bundle.join("Season 1/poster.jpg"), movie(500_000, 2)).unwrap();

    let app = directory_app(temp.path(), Duration::from_secs(2));
    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(31), "Season 1")),
        Some("bytes=65536-"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_value(&response, header::CONTENT_TYPE), "video/x-matroska");
    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 65536-119999/120000"
    );
    assert_eq!(body_bytes(response).await, &episode[65536..]);
}

#[tokio::test]
async fn test_bundle_appearing_later_is_picked_up() {
    let temp = tempfile::tempdir().unwrap();
    let app = directory_app(temp.path(), Duration::from_secs(5));
    let uri = stream_uri(&sample_magnet(&hash(32), "late"));

    let pending = {
        let router = app.router.clone();
        tokio::spawn(async move { get(&router, &uri, None).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Move the finished bundle into place in one step so no scan sees a half-written file.
    let staging = temp.path().join("staging");
    fs::create_dir_all(&staging).unwrap();
    let data = movie(10_000, 32);
    fs::write(staging.join("late.mp4"), &data).unwrap();
    fs::rename(&staging, temp.path().join(hash(32).to_string())).unwrap();

    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_missing_bundle_times_out() {
    let temp = tempfile::tempdir().unwrap();
    let app = directory_app(temp.path(), Duration::from_millis(100));

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(33), "gone")), None).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_base32_info_hash_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let app = directory_app(temp.path(), Duration::from_millis(100));

    let magnet = "magnet:?xt=urn:btih:CIAVTVBKGQ3SCBCJ4WCUXMZ3IEXUZTGR&dn=b32";
    let response = get(&app.router, &stream_uri(magnet), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
