//! Undertow Web - HTTP range-request streaming endpoint

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Exposes `GET /stream?magnet=<uri>` over axum and owns the process-level
//! wiring: the shared stream coordinator, the storage reaper task and
//! graceful shutdown.

pub mod handlers;
pub mod server;

// Re-export main types
pub use server::{AppState, build_router, run_server};
