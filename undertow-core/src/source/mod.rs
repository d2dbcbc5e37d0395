//! Content source abstraction.
//!
//! A content source turns an opaque locator (a magnet URI in practice) into a
//! bundle of files. Acquiring the bytes behind those files is entirely the
//! source's business: the streaming pipeline only waits for the bundle's
//! metadata, picks a file, and opens seekable readers over it while the
//! source keeps delivering data in the background.

pub mod directory;
pub mod magnet;
pub mod simulated;

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
pub use directory::DirectoryContentSource;
pub use magnet::{InfoHash, MagnetLink};
pub use simulated::{MemoryReaderFactory, SimulatedContentSource, SimulatedFile, sample_magnet};
use tokio::io::{AsyncRead, AsyncSeek};

/// Opaque identifier of a content bundle, supplied per request.
///
/// Always non-empty. The streaming pipeline never interprets it; only the
/// content source does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentLocator(String);

impl ContentLocator {
    /// Creates a locator from an optional request parameter.
    ///
    /// Returns `None` when the parameter is missing or empty.
    pub fn new(raw: Option<String>) -> Option<Self> {
        raw.filter(|value| !value.is_empty()).map(Self)
    }

    /// Returns the locator text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte reader that can be repositioned.
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> SeekableReader for T where T: AsyncRead + AsyncSeek + Send + Unpin {}

/// Produces fresh readers over one file's bytes.
#[async_trait]
pub trait ReaderFactory: Send + Sync {
    /// Opens a new reader positioned at the start of the file.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the underlying storage cannot be opened
    async fn open(&self) -> io::Result<Box<dyn SeekableReader>>;
}

/// One file inside a content bundle.
///
/// Immutable once the bundle's metadata is ready. The declared `length` is
/// authoritative even while the bytes are still arriving.
#[derive(Clone)]
pub struct FileDescriptor {
    name: String,
    length: u64,
    factory: Arc<dyn ReaderFactory>,
}

impl FileDescriptor {
    /// Creates a descriptor from its path-like name, byte length and reader factory.
    pub fn new(name: impl Into<String>, length: u64, factory: Arc<dyn ReaderFactory>) -> Self {
        Self {
            name: name.into(),
            length,
            factory,
        }
    }

    /// Path-like name of the file within its bundle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared length of the file in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Opens a new seekable reader over the file.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the reader factory fails to open the file
    pub async fn open_reader(&self) -> io::Result<Box<dyn SeekableReader>> {
        self.factory.open().await
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Resolved reference to a content bundle.
#[async_trait]
pub trait ContentHandle: Send + Sync {
    /// Storage key of the bundle, i.e. its directory name under the storage root.
    fn bundle_id(&self) -> &str;

    /// Suspends until the bundle's file list and lengths are known.
    ///
    /// Has no timeout of its own; callers bound the wait.
    async fn when_ready(&self);

    /// Ordered file list. Empty until metadata is ready.
    fn files(&self) -> Vec<FileDescriptor>;
}

/// Resolves content locators into bundle handles.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Accepts a locator and returns a handle whose metadata may not be ready yet.
    ///
    /// # Errors
    ///
    /// - `SourceError::InvalidLocator` - The locator cannot be interpreted
    /// - `SourceError::UnsupportedHash` - The locator names content this source cannot address
    /// - `SourceError::Io` - The source failed to set up storage for the bundle
    async fn resolve(&self, locator: &ContentLocator)
    -> Result<Arc<dyn ContentHandle>, SourceError>;
}

/// Errors raised by content sources while accepting a locator.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Locator is not a usable magnet link
    #[error("Invalid magnet link: {reason}")]
    InvalidLocator {
        /// Why the locator was rejected
        reason: String,
    },

    /// Info hash uses an encoding this source cannot address
    #[error("Unsupported info hash encoding: {hash}")]
    UnsupportedHash {
        /// The offending hash text
        hash: String,
    },

    /// Storage operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
