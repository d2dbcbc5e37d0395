//! Container detection by file name.

/// Video containers the server is willing to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaContainer {
    /// MPEG-4 Part 14 (`.mp4`)
    Mp4,
    /// Matroska (`.mkv`)
    Matroska,
}

impl MediaContainer {
    /// Detects the container from a file name's suffix. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".mp4") {
            Some(Self::Mp4)
        } else if name.ends_with(".mkv") {
            Some(Self::Matroska)
        } else {
            None
        }
    }

    /// MIME type sent in `Content-Type`.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Matroska => "video/x-matroska",
        }
    }
}

/// Content type for a file name. Anything not recognized is served as `video/mp4`.
pub fn content_type_for(name: &str) -> &'static str {
    MediaContainer::from_name(name)
        .unwrap_or(MediaContainer::Mp4)
        .mime_type()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for_known_and_unknown_names() {
        assert_eq!(content_type_for("movie.mkv"), "video/x-matroska");
        assert_eq!(content_type_for("movie.mp4"), "video/mp4");
        assert_eq!(content_type_for("movie.avi"), "video/mp4");
        assert_eq!(content_type_for("README"), "video/mp4");
    }

    #[test]
    fn test_container_detection_is_case_sensitive() {
        assert_eq!(MediaContainer::from_name("Show/E01.mkv"), Some(MediaContainer::Matroska));
        assert_eq!(MediaContainer::from_name("clip.mp4"), Some(MediaContainer::Mp4));
        assert_eq!(MediaContainer::from_name("CLIP.MP4"), None);
        assert_eq!(MediaContainer::from_name("clip.mp4.part"), None);
    }
}
