//! `GET /stream` status codes, headers and bodies.

use std::time::Duration;

use axum::http::{StatusCode, header};
use undertow_core::source::{SimulatedFile, sample_magnet};

use crate::common::{
    body_bytes, body_text, get, hash, header_value, movie, simulated_app, stream_uri,
};

#[tokio::test]
async fn test_missing_magnet_is_bad_request() {
    let (app, source) = simulated_app();

    for uri in ["/stream", "/stream?magnet="] {
        let response = get(&app.router, uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Magnet link is required");
    }
    assert_eq!(source.bundle_count(), 0, "nothing should be resolved");
}

#[tokio::test]
async fn test_unusable_magnet_is_server_error() {
    let (app, _source) = simulated_app();

    let response = get(&app.router, &stream_uri("magnet:?dn=no-hash-here"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.starts_with("Error adding magnet"));
}

#[tokio::test]
async fn test_bundle_without_video_is_not_found() {
    let (app, source) = simulated_app();
    source.publish(
        hash(1),
        vec![
            SimulatedFile::new("notes.txt", b"hello".to_vec()),
            SimulatedFile::new("MOVIE.MP4", movie(100, 0)),
        ],
    );

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(1), "x")), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "No video file found in the torrent");
}

#[tokio::test]
async fn test_metadata_that_never_arrives_times_out() {
    let (app, _source) = simulated_app();

    let started = std::time::Instant::now();
    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(2), "x")), None).await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!app.leases.is_leased(&hash(2).to_string()));
}

#[tokio::test]
async fn test_no_range_streams_whole_file_as_partial_content() {
    let (app, source) = simulated_app();
    let data = movie(50_000, 3);
    source.publish(hash(3), vec![SimulatedFile::new("film.mp4", data.clone())]);

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(3), "film")), None).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_value(&response, header::CONTENT_TYPE), "video/mp4");
    assert_eq!(header_value(&response, header::CONTENT_LENGTH), "50000");
    assert_eq!(header_value(&response, header::ACCEPT_RANGES), "bytes");
    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 0-49999/50000"
    );
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_bounded_range_returns_exact_slice() {
    let (app, source) = simulated_app();
    let data = movie(20_000, 4);
    source.publish(hash(4), vec![SimulatedFile::new("film.mkv", data.clone())]);

    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(4), "film")),
        Some("bytes=1000-10999"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_value(&response, header::CONTENT_TYPE), "video/x-matroska");
    assert_eq!(header_value(&response, header::CONTENT_LENGTH), "10000");
    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 1000-10999/20000"
    );
    assert_eq!(body_bytes(response).await, &data[1000..11000]);
}

#[tokio::test]
async fn test_open_ended_range_runs_to_end_of_file() {
    let (app, source) = simulated_app();
    let data = movie(9000, 5);
    source.publish(hash(5), vec![SimulatedFile::new("a.mp4", data.clone())]);

    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(5), "a")),
        Some("bytes=8000-"),
    )
    .await;

    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 8000-8999/9000"
    );
    assert_eq!(body_bytes(response).await, &data[8000..]);
}

#[tokio::test]
async fn test_zero_end_means_whole_file() {
    let (app, source) = simulated_app();
    let data = movie(3000, 6);
    source.publish(hash(6), vec![SimulatedFile::new("a.mp4", data.clone())]);

    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(6), "a")),
        Some("bytes=0-0"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 0-2999/3000"
    );
    assert_eq!(body_bytes(response).await.len(), 3000);
}

#[tokio::test]
async fn test_suffix_and_garbage_ranges_fall_back_to_whole_file() {
    let (app, source) = simulated_app();
    let data = movie(2048, 7);
    source.publish(hash(7), vec![SimulatedFile::new("a.mp4", data.clone())]);
    let uri = stream_uri(&sample_magnet(&hash(7), "a"));

    for range in ["bytes=-500", "items=0-10", "bytes=abc"] {
        let response = get(&app.router, &uri, Some(range)).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{range}");
        assert_eq!(
            header_value(&response, header::CONTENT_RANGE),
            "bytes 0-2047/2048",
            "{range}"
        );
        assert_eq!(body_bytes(response).await, data, "{range}");
    }
}

#[tokio::test]
async fn test_end_past_file_is_clamped() {
    let (app, source) = simulated_app();
    let data = movie(1000, 8);
    source.publish(hash(8), vec![SimulatedFile::new("a.mp4", data.clone())]);

    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(8), "a")),
        Some("bytes=900-5000"),
    )
    .await;

    assert_eq!(header_value(&response, header::CONTENT_LENGTH), "100");
    assert_eq!(
        header_value(&response, header::CONTENT_RANGE),
        "bytes 900-999/1000"
    );
    assert_eq!(body_bytes(response).await, &data[900..]);
}

#[tokio::test]
async fn test_start_past_file_is_not_satisfiable() {
    let (app, source) = simulated_app();
    source.publish(hash(9), vec![SimulatedFile::new("a.mp4", movie(1000, 9))]);

    let response = get(
        &app.router,
        &stream_uri(&sample_magnet(&hash(9), "a")),
        Some("bytes=1000-1100"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_value(&response, header::CONTENT_RANGE), "bytes */1000");
    assert!(!app.leases.is_leased(&hash(9).to_string()));
}

#[tokio::test]
async fn test_empty_video_is_not_satisfiable() {
    let (app, source) = simulated_app();
    source.publish(hash(10), vec![SimulatedFile::new("empty.mp4", Vec::new())]);

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(10), "e")), None).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_value(&response, header::CONTENT_RANGE), "bytes */0");
}

#[tokio::test]
async fn test_largest_video_wins_over_bigger_non_video() {
    let (app, source) = simulated_app();
    let feature = movie(6000, 11);
    source.publish(
        hash(11),
        vec![
            SimulatedFile::new("Show/extras.iso", movie(20_000, 1)),
            SimulatedFile::new("Show/trailer.mp4", movie(500, 2)),
            SimulatedFile::new("Show/feature.mkv", feature.clone()),
            SimulatedFile::new("Show/copy.mp4", movie(6000, 3)),
        ],
    );

    let response = get(&app.router, &stream_uri(&sample_magnet(&hash(11), "s")), None).await;

    assert_eq!(header_value(&response, header::CONTENT_TYPE), "video/x-matroska");
    assert_eq!(body_bytes(response).await, feature, "ties keep the earlier file");
}

#[tokio::test]
async fn test_cors_is_permissive() {
    let (app, source) = simulated_app();
    source.publish(hash(12), vec![SimulatedFile::new("a.mp4", movie(10, 0))]);

    let request = axum::http::Request::builder()
        .uri(stream_uri(&sample_magnet(&hash(12), "a")))
        .header(header::ORIGIN, "http://player.example")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert_eq!(
        header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        "*"
    );
    assert_eq!(body_bytes(response).await.len(), 10);
}
