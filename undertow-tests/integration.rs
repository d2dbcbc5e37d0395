//! Integration tests for Undertow
//!
//! These drive the axum router end to end: locator handling, metadata
//! waits, file selection, `Range` semantics, concurrent sessions and the
//! interaction between live sessions and the storage reaper.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/stream_endpoint.rs"]
mod stream_endpoint;

#[path = "integration/concurrent_sessions.rs"]
mod concurrent_sessions;

#[path = "integration/directory_source.rs"]
mod directory_source;

#[path = "integration/reaper_coordination.rs"]
mod reaper_coordination;
