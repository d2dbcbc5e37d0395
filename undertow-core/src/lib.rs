//! Undertow Core - range-request media streaming out of content bundles
//!
//! This crate holds everything below the HTTP layer: the content source
//! interface with its directory and in-memory implementations, `Range`
//! header parsing, file selection, the chunked streaming engine, bundle
//! leases with the storage reaper, and configuration.

pub mod config;
pub mod source;
pub mod storage;
pub mod streaming;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::UndertowConfig;
pub use source::{ContentSource, SourceError};
pub use storage::{BundleLeases, StorageReaper};
pub use streaming::{StreamCoordinator, StreamError};

/// Errors that end the server process.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {reason}")]
    Server { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_carry_reason() {
        let error = UndertowError::Server {
            reason: "failed to bind 0.0.0.0:80: permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Server error: failed to bind 0.0.0.0:80: permission denied"
        );

        let error = UndertowError::from(std::io::Error::other("accept failed"));
        assert_eq!(error.to_string(), "I/O error: accept failed");
    }
}
