//! Range-request streaming pipeline.
//!
//! Request flow: the [`StreamCoordinator`] resolves a locator through the
//! content source, waits for metadata, picks a file with
//! [`select_media_file`], interprets the `Range` header with
//! [`parse_range_header`] and hands a positioned [`StreamSession`] back to
//! the HTTP layer, which runs it against a [`StreamSink`].

pub mod coordinator;
pub mod media_type;
pub mod range;
pub mod selector;
pub mod session;
pub mod sink;

use std::io;
use std::time::Duration;

pub use coordinator::{PreparedStream, StreamCoordinator, StreamPhase};
pub use media_type::{MediaContainer, content_type_for};
pub use range::{ByteRange, parse_range_header};
pub use selector::select_media_file;
pub use session::{DEFAULT_CHUNK_SIZE, StreamSession};
pub use sink::{BodyStream, ChannelSink, StreamSink, WriterSink};

use crate::source::SourceError;

/// Failures of a single stream request.
///
/// Everything up to and including [`StreamError::Seek`] happens before the
/// response status is committed and can still become an HTTP error. Read and
/// write failures happen mid-body and can only end the connection.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// No content locator was supplied
    #[error("Magnet link is required")]
    MissingLocator,

    /// Content source refused the locator
    #[error("Error adding magnet: {0}")]
    Acquisition(#[from] SourceError),

    /// Metadata did not become ready in time
    #[error("Timed out after {waited:?} waiting for content metadata")]
    MetadataTimeout {
        /// How long the request waited
        waited: Duration,
    },

    /// Bundle contains no `.mp4` or `.mkv` file
    #[error("No video file found in the torrent")]
    NoPlayableFile,

    /// Requested range starts past the end of the file
    #[error("Range starting at {start} not satisfiable for {file_length} byte file")]
    RangeNotSatisfiable {
        /// Requested first byte
        start: u64,
        /// Length of the selected file
        file_length: u64,
    },

    /// Reader could not be opened
    #[error("Error opening file: {0}")]
    OpenReader(#[source] io::Error),

    /// Reader could not be positioned at the range start
    #[error("Error seeking in file to byte {position}: {source}")]
    Seek {
        /// Target offset
        position: u64,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Reader failed mid-stream
    #[error("Error reading file at byte {position}: {source}")]
    Read {
        /// Offset of the failed read
        position: u64,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Client sink rejected a write, usually because the client went away
    #[error("Error writing to client: {0}")]
    ClientWrite(#[source] io::Error),
}

impl StreamError {
    /// Whether the failure was caused by the client dropping the connection.
    pub fn is_client_disconnect(&self) -> bool {
        matches!(self, StreamError::ClientWrite(_))
    }

    /// Converts into an I/O error suitable for aborting a response body.
    pub fn into_io_error(self) -> io::Error {
        match self {
            StreamError::OpenReader(e) | StreamError::ClientWrite(e) => e,
            StreamError::Seek { source, .. } | StreamError::Read { source, .. } => source,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// Convenience alias for stream request results.
pub type StreamResult<T> = Result<T, StreamError>;
