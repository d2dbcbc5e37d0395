//! Independent sessions, late metadata and client disconnects.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use undertow_core::config::StreamingConfig;
use undertow_core::source::{SimulatedContentSource, SimulatedFile, sample_magnet};

use crate::common::{
    app_with, body_bytes, eventually, get, hash, header_value, movie, simulated_app, stream_uri,
};

#[tokio::test]
async fn test_parallel_ranges_do_not_interfere() {
    let (app, source) = simulated_app();
    let data = Arc::new(movie(100_000, 21));
    source.publish(hash(21), vec![SimulatedFile::new("big.mp4", data.to_vec())]);
    let uri = stream_uri(&sample_magnet(&hash(21), "big"));

    let mut requests = JoinSet::new();
    for i in 0..16u64 {
        let router = app.router.clone();
        let uri = uri.clone();
        let data = Arc::clone(&data);
        requests.spawn(async move {
            let start = i * 5000;
            let end = start + 4999 + i * 7;
            let range = format!("bytes={start}-{end}");

            let response = get(&router, &uri, Some(&range)).await;
            assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
            let body = body_bytes(response).await;
            assert_eq!(body, &data[start as usize..=end as usize], "{range}");
        });
    }

    while let Some(result) = requests.join_next().await {
        result.unwrap();
    }
    assert!(eventually(|| !app.leases.is_leased(&hash(21).to_string())).await);
}

#[tokio::test]
async fn test_pending_bundle_does_not_block_another_bundle() {
    let source = SimulatedContentSource::new();
    let app = app_with(
        Arc::new(source.clone()),
        StreamingConfig {
            chunk_size: 64,
            metadata_timeout: Duration::from_secs(10),
            channel_capacity: 1,
        },
    );

    let parked = {
        let router = app.router.clone();
        let uri = stream_uri(&sample_magnet(&hash(24), "never"));
        tokio::spawn(async move { get(&router, &uri, None).await })
    };
    assert!(eventually(|| app.leases.is_leased(&hash(24).to_string())).await);

    let data = movie(5000, 25);
    source.publish(hash(25), vec![SimulatedFile::new("ready.mp4", data.clone())]);

    let body = tokio::time::timeout(Duration::from_secs(2), async {
        let response = get(
            &app.router,
            &stream_uri(&sample_magnet(&hash(25), "ready")),
            Some("bytes=1000-1199"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        body_bytes(response).await
    })
    .await
    .expect("ready bundle should stream while the other waits");

    assert_eq!(body, &data[1000..1200]);
    assert!(!parked.is_finished());
    assert!(app.leases.is_leased(&hash(24).to_string()));
    assert!(eventually(|| !app.leases.is_leased(&hash(25).to_string())).await);

    parked.abort();
}

#[tokio::test]
async fn test_request_waits_for_late_metadata() {
    let source = SimulatedContentSource::new();
    let app = app_with(
        Arc::new(source.clone()),
        StreamingConfig {
            chunk_size: 1024,
            metadata_timeout: Duration::from_secs(5),
            channel_capacity: 1,
        },
    );
    let uri = stream_uri(&sample_magnet(&hash(22), "late"));

    let pending = {
        let router = app.router.clone();
        tokio::spawn(async move { get(&router, &uri, Some("bytes=10-19")).await })
    };

    assert!(eventually(|| app.leases.is_leased(&hash(22).to_string())).await);
    assert!(!pending.is_finished());

    let data = movie(64, 22);
    source.publish(hash(22), vec![SimulatedFile::new("late.mp4", data.clone())]);

    let response = pending.await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_value(&response, header::CONTENT_RANGE), "bytes 10-19/64");
    assert_eq!(body_bytes(response).await, &data[10..20]);
}

#[tokio::test]
async fn test_client_disconnect_ends_session_and_releases_lease() {
    let (app, source) = simulated_app();
    source.publish(
        hash(23),
        vec![SimulatedFile::new("huge.mp4", movie(32 * 1024 * 1024, 23))],
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = {
        let router = app.router.clone();
        tokio::spawn(async move { axum::serve(listener, router).await })
    };

    let mut client = TcpStream::connect(address).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n",
        stream_uri(&sample_magnet(&hash(23), "huge"))
    );
    client.write_all(request.as_bytes()).await.unwrap();

    let mut head = vec![0u8; 1024];
    let read = client.read(&mut head).await.unwrap();
    assert!(String::from_utf8_lossy(&head[..read]).starts_with("HTTP/1.1 206"));
    assert!(app.leases.is_leased(&hash(23).to_string()));

    // Walk away long before 32 MiB could have been sent.
    drop(client);

    assert!(
        eventually(|| !app.leases.is_leased(&hash(23).to_string())).await,
        "session should notice the closed connection"
    );
    server.abort();
}
