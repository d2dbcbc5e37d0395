//! Per-request orchestration of the streaming pipeline.
//!
//! A request walks `Resolving → AwaitingMetadata → Selecting → Streaming`.
//! Every failure before `Streaming` is returned as a [`StreamError`] while
//! the HTTP status can still be chosen; once a [`PreparedStream`] is handed
//! out the caller commits a 206 and only the copy itself can fail.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::media_type::content_type_for;
use super::range::{ByteRange, parse_range_header};
use super::selector::select_media_file;
use super::session::StreamSession;
use super::sink::ChannelSink;
use super::{StreamError, StreamResult};
use crate::config::StreamingConfig;
use crate::source::{ContentLocator, ContentSource};
use crate::storage::BundleLeases;

/// Stage of a stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Validating the locator and handing it to the content source
    Resolving,
    /// Waiting for the bundle's file list
    AwaitingMetadata,
    /// Choosing the file and interpreting the range
    Selecting,
    /// Copying bytes to the client
    Streaming,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamPhase::Resolving => "resolving",
            StreamPhase::AwaitingMetadata => "awaiting-metadata",
            StreamPhase::Selecting => "selecting",
            StreamPhase::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Turns stream requests into ready-to-run sessions.
///
/// Holds no per-request state; one instance serves every request concurrently.
pub struct StreamCoordinator {
    source: Arc<dyn ContentSource>,
    leases: BundleLeases,
    config: StreamingConfig,
}

impl StreamCoordinator {
    /// Creates a coordinator over `source`, registering sessions in `leases`.
    pub fn new(source: Arc<dyn ContentSource>, leases: BundleLeases, config: StreamingConfig) -> Self {
        Self {
            source,
            leases,
            config,
        }
    }

    /// Lease registry shared with the storage reaper.
    pub fn leases(&self) -> &BundleLeases {
        &self.leases
    }

    /// Streaming settings in effect.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Runs every step up to the point where response headers can be committed.
    ///
    /// The bundle lease is taken as soon as the locator resolves and travels
    /// with the returned session, so the reaper leaves the bundle alone for
    /// the whole request.
    ///
    /// # Errors
    ///
    /// - `StreamError::MissingLocator` - `locator` is missing or empty
    /// - `StreamError::Acquisition` - Content source rejected the locator
    /// - `StreamError::MetadataTimeout` - Metadata not ready within the configured wait
    /// - `StreamError::NoPlayableFile` - No `.mp4`/`.mkv` file in the bundle
    /// - `StreamError::RangeNotSatisfiable` - Range starts at or past the end of the file
    /// - `StreamError::OpenReader` / `StreamError::Seek` - File could not be opened or positioned
    pub async fn prepare(
        &self,
        locator: Option<String>,
        range_header: Option<&str>,
    ) -> StreamResult<PreparedStream> {
        debug!("Stream request entering {}", StreamPhase::Resolving);
        let locator = ContentLocator::new(locator).ok_or(StreamError::MissingLocator)?;
        info!("Processing magnet link: {}", locator);

        let handle = self.source.resolve(&locator).await.map_err(|e| {
            error!("Error adding magnet: {}", e);
            StreamError::Acquisition(e)
        })?;
        let bundle_id = handle.bundle_id().to_string();
        let lease = self.leases.acquire(&bundle_id);

        debug!("Bundle {} entering {}", bundle_id, StreamPhase::AwaitingMetadata);
        let waited = self.config.metadata_timeout;
        tokio::time::timeout(waited, handle.when_ready())
            .await
            .map_err(|_| {
                warn!("Metadata for bundle {} not ready after {:?}", bundle_id, waited);
                StreamError::MetadataTimeout { waited }
            })?;

        debug!("Bundle {} entering {}", bundle_id, StreamPhase::Selecting);
        let files = handle.files();
        let file = select_media_file(&files).ok_or_else(|| {
            warn!("No video file found in bundle {}", bundle_id);
            StreamError::NoPlayableFile
        })?;
        info!("Streaming video file: {}", file.name());

        let range = parse_range_header(range_header, file.length()).clamped();
        if !range.is_satisfiable() {
            return Err(StreamError::RangeNotSatisfiable {
                start: range.start,
                file_length: file.length(),
            });
        }

        let reader = file.open_reader().await.map_err(|e| {
            error!("Error opening {}: {}", file.name(), e);
            StreamError::OpenReader(e)
        })?;
        let session = StreamSession::open(reader, range, self.config.chunk_size)
            .await
            .inspect_err(|e| error!("{}", e))?
            .with_lease(lease);

        Ok(PreparedStream {
            file_name: file.name().to_string(),
            content_type: content_type_for(file.name()),
            range,
            session,
        })
    }
}

/// A positioned session plus everything needed to write response headers.
pub struct PreparedStream {
    file_name: String,
    content_type: &'static str,
    range: ByteRange,
    session: StreamSession,
}

impl PreparedStream {
    /// Name of the selected file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `Content-Type` of the selected file.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Validated interval the body will carry.
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// Identifier of the underlying session.
    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Response headers for the 206, as lower-case name and value pairs.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("content-type", self.content_type.to_string()),
            ("content-length", self.range.content_length().to_string()),
            ("accept-ranges", "bytes".to_string()),
            ("content-range", self.range.content_range()),
        ]
    }

    /// Gives up the session for callers that drive it themselves.
    pub fn into_session(self) -> StreamSession {
        self.session
    }

    /// Runs the session on its own task, feeding `sink`.
    ///
    /// A client disconnect ends the task quietly. Any other failure is
    /// logged and forwarded into the body so the connection is cut rather
    /// than finishing short.
    pub fn spawn_into(self, mut sink: ChannelSink) -> JoinHandle<()> {
        let PreparedStream {
            file_name,
            range,
            session,
            ..
        } = self;
        let id = session.id();
        let expected = range.content_length();

        tokio::spawn(async move {
            debug!("Session {} entering {}", id, StreamPhase::Streaming);
            match session.run(&mut sink).await {
                Ok(written) if written < expected => warn!(
                    "Stream ended short: session {} sent {} of {} bytes of {}",
                    id, written, expected, file_name
                ),
                Ok(written) => info!("Stream completed: session {} sent {} bytes of {}", id, written, file_name),
                Err(e) if e.is_client_disconnect() => {
                    warn!("Client left session {} for {}: {}", id, file_name, e);
                }
                Err(e) => {
                    error!("Session {} for {} failed: {}", id, file_name, e);
                    sink.abort(e.into_io_error()).await;
                }
            }
        })
    }
}
