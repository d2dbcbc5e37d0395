//! HTTP `Range` header interpretation.
//!
//! Only the single-range form `bytes=<start>-<end>` is understood. Anything
//! else degrades to serving the whole file rather than failing the request.
//!
//! An explicit end of `0` is treated as "no end given", so `bytes=0-0`
//! yields the whole file instead of its first byte.
//!
//! Blanks are allowed before either number (`bytes= 100- 299`) but not
//! before the dash.

use std::fmt;

const BYTES_PREFIX: &str = "bytes=";

/// Inclusive byte interval of a file, plus the file's total length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset to send
    pub start: u64,
    /// Last byte offset to send (inclusive)
    pub end: u64,
    /// Total length of the underlying file
    pub file_length: u64,
}

impl ByteRange {
    /// Range covering the whole file.
    pub fn full(file_length: u64) -> Self {
        Self {
            start: 0,
            end: file_length.saturating_sub(1),
            file_length,
        }
    }

    /// Number of bytes the response body carries: `end - start + 1`, or 0 for an inverted range.
    pub fn content_length(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.file_length)
    }

    /// Whether this range can be served from a file of `file_length` bytes.
    pub fn is_satisfiable(&self) -> bool {
        self.file_length > 0 && self.start <= self.end && self.start < self.file_length
    }

    /// Caps `end` at the last byte of the file.
    pub fn clamped(self) -> Self {
        Self {
            end: self.end.min(self.file_length.saturating_sub(1)),
            ..self
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.start, self.end, self.file_length)
    }
}

/// Interprets an optional `Range` header against a file of `file_length` bytes.
///
/// Performs no bounds checking; callers validate the result with
/// [`ByteRange::is_satisfiable`] before trusting its content length.
///
/// # Examples
/// ```
/// use undertow_core::streaming::parse_range_header;
///
/// let range = parse_range_header(Some("bytes=100-299"), 1000);
/// assert_eq!((range.start, range.end, range.content_length()), (100, 299, 200));
///
/// let range = parse_range_header(None, 1000);
/// assert_eq!((range.start, range.end, range.content_length()), (0, 999, 1000));
/// ```
pub fn parse_range_header(header: Option<&str>, file_length: u64) -> ByteRange {
    let header = match header {
        Some(value) if !value.is_empty() => value,
        _ => return ByteRange::full(file_length),
    };

    let (start, end) = scan_single_range(header);
    let end = if end == 0 {
        file_length.saturating_sub(1)
    } else {
        end
    };

    ByteRange {
        start,
        end,
        file_length,
    }
}

/// Scans `bytes=<start>-<end>` left to right, stopping at the first mismatch.
///
/// Fields that could not be read stay zero.
fn scan_single_range(header: &str) -> (u64, u64) {
    let Some(spec) = header.strip_prefix(BYTES_PREFIX) else {
        return (0, 0);
    };

    let Some((start, rest)) = leading_number(spec) else {
        return (0, 0);
    };

    let end = rest
        .strip_prefix('-')
        .and_then(leading_number)
        .map(|(end, _)| end)
        .unwrap_or(0);

    (start, end)
}

/// Parses the leading run of ASCII digits after optional blanks, returning
/// the value and the remainder.
fn leading_number(input: &str) -> Option<(u64, &str)> {
    let input = input.trim_start_matches([' ', '\t']);
    let digits = input
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let value = input[..digits].parse::<u64>().ok()?;
    Some((value, &input[digits..]))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_missing_header_is_full_file() {
        let range = parse_range_header(None, 1000);
        assert_eq!((range.start, range.end, range.content_length()), (0, 999, 1000));
        assert_eq!(range.content_range(), "bytes 0-999/1000");
    }

    #[test]
    fn test_empty_header_is_full_file() {
        let range = parse_range_header(Some(""), 1000);
        assert_eq!(range, ByteRange::full(1000));
    }

    #[test]
    fn test_explicit_range() {
        let range = parse_range_header(Some("bytes=100-299"), 1000);
        assert_eq!((range.start, range.end, range.content_length()), (100, 299, 200));
        assert_eq!(range.content_range(), "bytes 100-299/1000");
    }

    #[test]
    fn test_open_ended_range() {
        let range = parse_range_header(Some("bytes=500-"), 1000);
        assert_eq!((range.start, range.end, range.content_length()), (500, 999, 500));
    }

    #[test]
    fn test_zero_end_means_unspecified() {
        let range = parse_range_header(Some("bytes=0-0"), 1000);
        assert_eq!((range.start, range.end), (0, 999));

        let range = parse_range_header(Some("bytes=10-0"), 1000);
        assert_eq!((range.start, range.end), (10, 999));
    }

    #[test]
    fn test_suffix_range_degrades_to_full_file() {
        let range = parse_range_header(Some("bytes=-500"), 1000);
        assert_eq!(range, ByteRange::full(1000));
    }

    #[test]
    fn test_multi_range_uses_first_range() {
        let range = parse_range_header(Some("bytes=0-99,200-299"), 1000);
        assert_eq!((range.start, range.end), (0, 99));
    }

    #[test]
    fn test_garbage_degrades_to_full_file() {
        for header in ["items=1-2", "bytes=abc-def", "bytes=", "bytes=99999999999999999999-1"] {
            let range = parse_range_header(Some(header), 1000);
            assert_eq!(range, ByteRange::full(1000), "header {header:?}");
        }
    }

    #[test]
    fn test_blanks_before_numbers_are_skipped() {
        for header in ["bytes= 100-299", "bytes=100- 299", "bytes=\t100-\t299"] {
            let range = parse_range_header(Some(header), 1000);
            assert_eq!((range.start, range.end), (100, 299), "header {header:?}");
        }

        let range = parse_range_header(Some("bytes=100 -299"), 1000);
        assert_eq!((range.start, range.end), (100, 999));
    }

    #[test]
    fn test_trailing_garbage_after_end_is_ignored() {
        let range = parse_range_header(Some("bytes=5-9xyz"), 100);
        assert_eq!((range.start, range.end), (5, 9));
    }

    #[test]
    fn test_start_beyond_length_is_not_checked() {
        let range = parse_range_header(Some("bytes=2000-"), 1000);
        assert_eq!((range.start, range.end), (2000, 999));
        assert_eq!(range.content_length(), 0);
        assert!(!range.is_satisfiable());
    }

    #[test]
    fn test_clamped_caps_end() {
        let range = parse_range_header(Some("bytes=100-5000"), 1000).clamped();
        assert_eq!((range.start, range.end, range.content_length()), (100, 999, 900));
        assert!(range.is_satisfiable());
    }

    #[test]
    fn test_empty_file_is_never_satisfiable() {
        let range = parse_range_header(None, 0);
        assert_eq!((range.start, range.end), (0, 0));
        assert!(!range.is_satisfiable());
    }

    proptest! {
        #[test]
        fn prop_valid_range_has_exact_length(
            file_length in 2u64..1_000_000,
            a in 0u64..1_000_000,
            b in 1u64..1_000_000,
        ) {
            let end = b % file_length;
            prop_assume!(end > 0);
            let start = a % (end + 1);

            let header = format!("bytes={start}-{end}");
            let range = parse_range_header(Some(&header), file_length);

            prop_assert_eq!(range.start, start);
            prop_assert_eq!(range.end, end);
            prop_assert_eq!(range.content_length(), end - start + 1);
            prop_assert!(range.is_satisfiable());
        }

        #[test]
        fn prop_arbitrary_headers_never_panic(header in ".*", file_length in 0u64..10_000) {
            let range = parse_range_header(Some(&header), file_length);
            prop_assert!(range.content_length() <= range.end.saturating_add(1));
        }
    }
}
