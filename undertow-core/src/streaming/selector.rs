//! Picks the file to stream out of a bundle.

use super::media_type::MediaContainer;
use crate::source::FileDescriptor;

/// Returns the largest `.mp4`/`.mkv` file, preferring the earliest on ties.
///
/// `None` when the bundle holds no playable file.
pub fn select_media_file(files: &[FileDescriptor]) -> Option<&FileDescriptor> {
    files
        .iter()
        .filter(|file| MediaContainer::from_name(file.name()).is_some())
        .fold(None, |best: Option<&FileDescriptor>, file| match best {
            Some(current) if file.length() <= current.length() => Some(current),
            _ => Some(file),
        })
}
