//! Filesystem-backed content source.
//!
//! Bundles live under `<storage root>/<info hash>`, the same layout a
//! BitTorrent client storing by info hash produces. The source never
//! downloads anything itself: metadata becomes ready once some other
//! process has placed at least one file in the bundle directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{
    ContentHandle, ContentLocator, ContentSource, FileDescriptor, MagnetLink, ReaderFactory,
    SeekableReader, SourceError,
};

/// Content source that serves bundles already present on local disk.
#[derive(Debug, Clone)]
pub struct DirectoryContentSource {
    root: PathBuf,
    poll_interval: Duration,
}

impl DirectoryContentSource {
    /// Creates a source rooted at `root`, re-checking pending bundles every `poll_interval`.
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    /// Storage root this source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentSource for DirectoryContentSource {
    async fn resolve(
        &self,
        locator: &ContentLocator,
    ) -> Result<Arc<dyn ContentHandle>, SourceError> {
        let magnet = MagnetLink::parse(locator.as_str())?;
        let bundle_id = magnet.info_hash.to_string();
        let directory = self.root.join(&bundle_id);

        debug!(
            "Resolved {} to bundle directory {}",
            magnet.display_name.as_deref().unwrap_or(&bundle_id),
            directory.display()
        );

        Ok(Arc::new(DirectoryBundle {
            bundle_id,
            directory,
            poll_interval: self.poll_interval,
            files: OnceCell::new(),
        }))
    }
}

struct DirectoryBundle {
    bundle_id: String,
    directory: PathBuf,
    poll_interval: Duration,
    files: OnceCell<Vec<FileDescriptor>>,
}

#[async_trait]
impl ContentHandle for DirectoryBundle {
    fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    async fn when_ready(&self) {
        self.files
            .get_or_init(|| async {
                loop {
                    match scan_bundle(&self.directory).await {
                        Ok(files) if !files.is_empty() => return files,
                        Ok(_) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => warn!(
                            "Failed to scan bundle {}: {}",
                            self.directory.display(),
                            e
                        ),
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            })
            .await;
    }

    fn files(&self) -> Vec<FileDescriptor> {
        self.files.get().cloned().unwrap_or_default()
    }
}

/// Lists every regular file below `directory`, sorted by relative path.
async fn scan_bundle(directory: &Path) -> io::Result<Vec<FileDescriptor>> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;

            if metadata.is_dir() {
                pending.push(path);
            } else if metadata.is_file()
                && let Ok(relative) = path.strip_prefix(directory)
            {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(FileDescriptor::new(
                    name,
                    metadata.len(),
                    Arc::new(FileReaderFactory { path }),
                ));
            }
        }
    }

    files.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(files)
}

struct FileReaderFactory {
    path: PathBuf,
}

#[async_trait]
impl ReaderFactory for FileReaderFactory {
    async fn open(&self) -> io::Result<Box<dyn SeekableReader>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn locator() -> ContentLocator {
        ContentLocator::new(Some(format!("magnet:?xt=urn:btih:{HASH}&dn=test"))).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_maps_info_hash_to_directory() {
        let temp = TempDir::new().unwrap();
        let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));

        let handle = source.resolve(&locator()).await.unwrap();
        assert_eq!(handle.bundle_id(), HASH);
        assert!(handle.files().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_locator() {
        let temp = TempDir::new().unwrap();
        let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));
        let locator = ContentLocator::new(Some("not-a-magnet".to_string())).unwrap();

        let result = source.resolve(&locator).await;
        assert!(matches!(result, Err(SourceError::InvalidLocator { .. })));
    }

    #[tokio::test]
    async fn test_lists_nested_files_in_order() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join(HASH);
        std::fs::create_dir_all(bundle.join("Extras")).unwrap();
        std::fs::write(bundle.join("movie.mkv"), vec![7u8; 64]).unwrap();
        std::fs::write(bundle.join("Extras/trailer.mp4"), vec![1u8; 16]).unwrap();
        std::fs::write(bundle.join("info.nfo"), b"nfo").unwrap();

        let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));
        let handle = source.resolve(&locator()).await.unwrap();
        handle.when_ready().await;

        let files = handle.files();
        let names: Vec<_> = files.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["Extras/trailer.mp4", "info.nfo", "movie.mkv"]);
        assert_eq!(files[2].length(), 64);

        let mut reader = files[2].open_reader().await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, vec![7u8; 64]);
    }

    #[tokio::test]
    async fn test_readiness_waits_for_bundle_to_appear() {
        let temp = TempDir::new().unwrap();
        let source = DirectoryContentSource::new(temp.path(), Duration::from_millis(10));
        let handle = source.resolve(&locator()).await.unwrap();

        let pending =
            tokio::time::timeout(Duration::from_millis(50), handle.when_ready()).await;
        assert!(pending.is_err(), "metadata must not be ready without files");

        let bundle = temp.path().join(HASH);
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("late.mp4"), vec![0u8; 8]).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle.when_ready())
            .await
            .expect("metadata should become ready once a file lands");
        assert_eq!(handle.files().len(), 1);
    }
}
