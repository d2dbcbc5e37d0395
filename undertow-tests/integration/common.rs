//! Shared fixtures for the integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use tower::ServiceExt;
use undertow_core::config::StreamingConfig;
use undertow_core::source::{ContentSource, InfoHash, SimulatedContentSource};
use undertow_core::storage::BundleLeases;
use undertow_core::streaming::StreamCoordinator;
use undertow_web::{AppState, build_router};

/// Router plus the handles tests need to poke at its internals.
pub struct TestApp {
    pub router: Router,
    pub leases: BundleLeases,
}

/// Small chunks so multi-chunk paths are exercised on small files.
pub fn test_streaming_config() -> StreamingConfig {
    StreamingConfig {
        chunk_size: 4096,
        metadata_timeout: Duration::from_millis(200),
        channel_capacity: 1,
    }
}

pub fn app_with(source: Arc<dyn ContentSource>, config: StreamingConfig) -> TestApp {
    let leases = BundleLeases::new();
    let coordinator = StreamCoordinator::new(source, leases.clone(), config);
    TestApp {
        router: build_router(AppState::new(coordinator)),
        leases,
    }
}

pub fn simulated_app() -> (TestApp, SimulatedContentSource) {
    let source = SimulatedContentSource::new();
    let app = app_with(Arc::new(source.clone()), test_streaming_config());
    (app, source)
}

/// Deterministic, non-repeating-per-chunk file contents.
pub fn movie(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i / 7) as u8).wrapping_add(i as u8).wrapping_add(seed))
        .collect()
}

pub fn hash(byte: u8) -> InfoHash {
    InfoHash::new([byte; 20])
}

pub fn stream_uri(magnet: &str) -> String {
    format!("/stream?magnet={}", urlencoding::encode(magnet))
}

pub async fn get(router: &Router, uri: &str, range: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }

    router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub fn header_value(response: &Response<Body>, name: header::HeaderName) -> String {
    response.headers()[name].to_str().unwrap().to_string()
}

/// Polls `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
