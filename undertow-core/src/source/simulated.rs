//! In-memory content source for development and tests.
//!
//! Behaves like a swarm that may or may not have produced metadata yet:
//! resolving an unknown info hash succeeds but the returned handle stays
//! pending until files are published for that hash.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::debug;

use super::{
    ContentHandle, ContentLocator, ContentSource, FileDescriptor, InfoHash, MagnetLink,
    ReaderFactory, SeekableReader, SourceError,
};

/// File contents published into a simulated bundle.
#[derive(Debug, Clone)]
pub struct SimulatedFile {
    /// Path-like name inside the bundle
    pub name: String,
    /// Complete file contents
    pub data: Bytes,
}

impl SimulatedFile {
    /// Creates a simulated file from a name and its bytes.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Builds a magnet URI for `info_hash` with a display name.
pub fn sample_magnet(info_hash: &InfoHash, name: &str) -> String {
    format!(
        "magnet:?xt=urn:btih:{info_hash}&dn={}",
        urlencoding::encode(name)
    )
}

/// Content source holding bundles entirely in memory.
#[derive(Clone, Default)]
pub struct SimulatedContentSource {
    bundles: Arc<Mutex<HashMap<InfoHash, Arc<SimulatedBundle>>>>,
}

impl SimulatedContentSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the file list for `info_hash` and fires its readiness signal.
    ///
    /// Handles resolved before publication wake up; later resolutions are
    /// ready immediately.
    pub fn publish(&self, info_hash: InfoHash, files: Vec<SimulatedFile>) {
        let bundle = self.bundle(info_hash);
        let descriptors = files
            .into_iter()
            .map(|file| {
                let length = file.data.len() as u64;
                FileDescriptor::new(
                    file.name,
                    length,
                    Arc::new(MemoryReaderFactory::new(file.data)),
                )
            })
            .collect();

        *bundle.files.write() = descriptors;
        bundle.ready.send_replace(true);
        debug!("Published simulated metadata for {}", info_hash);
    }

    /// Number of bundles this source knows about, published or pending.
    pub fn bundle_count(&self) -> usize {
        self.bundles.lock().len()
    }

    fn bundle(&self, info_hash: InfoHash) -> Arc<SimulatedBundle> {
        self.bundles
            .lock()
            .entry(info_hash)
            .or_insert_with(|| {
                let (ready, _) = watch::channel(false);
                Arc::new(SimulatedBundle {
                    bundle_id: info_hash.to_string(),
                    ready,
                    files: RwLock::new(Vec::new()),
                })
            })
            .clone()
    }
}

#[async_trait]
impl ContentSource for SimulatedContentSource {
    async fn resolve(
        &self,
        locator: &ContentLocator,
    ) -> Result<Arc<dyn ContentHandle>, SourceError> {
        let magnet = MagnetLink::parse(locator.as_str())?;
        let handle: Arc<dyn ContentHandle> = self.bundle(magnet.info_hash);
        Ok(handle)
    }
}

struct SimulatedBundle {
    bundle_id: String,
    ready: watch::Sender<bool>,
    files: RwLock<Vec<FileDescriptor>>,
}

#[async_trait]
impl ContentHandle for SimulatedBundle {
    fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    async fn when_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so this only fails if we are gone.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    fn files(&self) -> Vec<FileDescriptor> {
        if *self.ready.borrow() {
            self.files.read().clone()
        } else {
            Vec::new()
        }
    }
}

/// Reader factory over an in-memory buffer.
pub struct MemoryReaderFactory {
    data: Bytes,
}

impl MemoryReaderFactory {
    /// Wraps `data`; every reader gets a cheap clone of it.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ReaderFactory for MemoryReaderFactory {
    async fn open(&self) -> io::Result<Box<dyn SeekableReader>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn hash(byte: u8) -> InfoHash {
        InfoHash::new([byte; 20])
    }

    fn locator_for(info_hash: &InfoHash) -> ContentLocator {
        ContentLocator::new(Some(sample_magnet(info_hash, "Demo Movie"))).unwrap()
    }

    #[test]
    fn test_sample_magnet_is_parseable() {
        let magnet = sample_magnet(&hash(0xab), "Big Buck Bunny (2008)");
        let link = MagnetLink::parse(&magnet).unwrap();
        assert_eq!(link.info_hash, hash(0xab));
        assert!(magnet.contains("dn=Big%20Buck%20Bunny%20%282008%29"));
    }

    #[tokio::test]
    async fn test_published_bundle_is_ready() {
        let source = SimulatedContentSource::new();
        source.publish(hash(1), vec![SimulatedFile::new("a.mp4", vec![1u8; 10])]);

        let handle = source.resolve(&locator_for(&hash(1))).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle.when_ready())
            .await
            .unwrap();

        let files = handle.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name(), "a.mp4");
        assert_eq!(files[0].length(), 10);
    }

    #[tokio::test]
    async fn test_unknown_bundle_stays_pending_until_published() {
        let source = SimulatedContentSource::new();
        let handle = source.resolve(&locator_for(&hash(2))).await.unwrap();

        assert!(handle.files().is_empty());
        let waited = tokio::time::timeout(Duration::from_millis(30), handle.when_ready()).await;
        assert!(waited.is_err());

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.when_ready().await })
        };
        source.publish(hash(2), vec![SimulatedFile::new("late.mkv", vec![0u8; 4])]);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.files().len(), 1);
        assert_eq!(source.bundle_count(), 1);
    }
}
