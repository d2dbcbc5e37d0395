//! Byte-range copy from a seekable reader to a stream sink.

use std::io::SeekFrom;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};
use uuid::Uuid;

use super::range::ByteRange;
use super::sink::StreamSink;
use super::StreamError;
use crate::source::SeekableReader;
use crate::storage::BundleLease;

/// Default read buffer size.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB

/// One streaming session: owns a reader positioned at the start of a range.
///
/// The reader, and the bundle lease if one is attached, are released when
/// the session is dropped, which happens on every exit path of [`StreamSession::run`].
pub struct StreamSession {
    id: Uuid,
    reader: Box<dyn SeekableReader>,
    range: ByteRange,
    chunk_size: usize,
    lease: Option<BundleLease>,
}

impl StreamSession {
    /// Seeks `reader` to `range.start` and wraps it in a session.
    ///
    /// # Errors
    ///
    /// - `StreamError::Seek` - The reader could not be positioned
    pub async fn open(
        mut reader: Box<dyn SeekableReader>,
        range: ByteRange,
        chunk_size: usize,
    ) -> Result<Self, StreamError> {
        reader
            .seek(SeekFrom::Start(range.start))
            .await
            .map_err(|source| StreamError::Seek {
                position: range.start,
                source,
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            reader,
            range,
            chunk_size: chunk_size.max(1),
            lease: None,
        })
    }

    /// Keeps `lease` alive for as long as the session exists.
    pub fn with_lease(mut self, lease: BundleLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Interval this session copies.
    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// Copies the range into `sink`, flushing after every chunk.
    ///
    /// Stops after `range.content_length()` bytes or at end of stream,
    /// whichever comes first, and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `StreamError::Read` - The reader failed before the range was exhausted
    /// - `StreamError::ClientWrite` - The sink rejected a write or flush
    pub async fn run<S>(mut self, sink: &mut S) -> Result<u64, StreamError>
    where
        S: StreamSink + ?Sized,
    {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut remaining = self.range.content_length();
        let mut position = self.range.start;

        while remaining > 0 {
            let want = remaining.min(buffer.len() as u64) as usize;
            let read = self
                .reader
                .read(&mut buffer[..want])
                .await
                .map_err(|source| StreamError::Read { position, source })?;

            if read == 0 {
                debug!(
                    "Session {}: source ended at byte {} before {}",
                    self.id, position, self.range.end
                );
                break;
            }

            sink.write_chunk(Bytes::copy_from_slice(&buffer[..read]))
                .await
                .map_err(StreamError::ClientWrite)?;
            sink.flush().await.map_err(StreamError::ClientWrite)?;

            position += read as u64;
            remaining -= read as u64;
            trace!("Session {}: sent {} bytes, now at {}", self.id, read, position);
        }

        Ok(position - self.range.start)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use async_trait::async_trait;
    use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

    use super::*;
    use crate::storage::BundleLeases;
    use crate::streaming::WriterSink;
    use crate::streaming::parse_range_header;

    /// Records every chunk and flush it receives.
    #[derive(Default)]
    struct RecordingSink {
        chunks: Vec<Bytes>,
        flushes: usize,
    }

    impl RecordingSink {
        fn bytes(&self) -> Vec<u8> {
            self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
        }
    }

    #[async_trait]
    impl StreamSink for RecordingSink {
        async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
            self.chunks.push(chunk);
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    /// Reader whose seek or read always fails.
    struct BrokenReader {
        fail_seek: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("piece unavailable")))
        }
    }

    impl AsyncSeek for BrokenReader {
        fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
            if self.fail_seek {
                Err(io::Error::new(io::ErrorKind::InvalidInput, "bad seek"))
            } else {
                Ok(())
            }
        }

        fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Poll::Ready(Ok(0))
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn reader(data: &[u8]) -> Box<dyn SeekableReader> {
        Box::new(Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn test_full_file_round_trip() {
        let data = sample(10_000);
        let range = parse_range_header(None, data.len() as u64);
        let session = StreamSession::open(reader(&data), range, 4096).await.unwrap();

        let mut sink = RecordingSink::default();
        let written = session.run(&mut sink).await.unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(sink.bytes(), data);
        assert_eq!(sink.chunks.len(), 3);
        assert_eq!(sink.flushes, sink.chunks.len());
    }

    #[tokio::test]
    async fn test_partial_range_is_exact() {
        let data = sample(1000);
        let range = parse_range_header(Some("bytes=100-299"), 1000);
        let session = StreamSession::open(reader(&data), range, 64).await.unwrap();

        let mut sink = RecordingSink::default();
        let written = session.run(&mut sink).await.unwrap();

        assert_eq!(written, 200);
        assert_eq!(sink.bytes(), &data[100..300]);
        // Never read past the end of the range, even with a partial last chunk.
        assert_eq!(sink.chunks.last().unwrap().len(), 200 % 64);
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_offset_order() {
        let data = sample(512);
        let range = parse_range_header(Some("bytes=10-500"), 512);
        let session = StreamSession::open(reader(&data), range, 50).await.unwrap();

        let mut sink = RecordingSink::default();
        session.run(&mut sink).await.unwrap();

        let mut offset = 10;
        for chunk in &sink.chunks {
            assert_eq!(&chunk[..], &data[offset..offset + chunk.len()]);
            offset += chunk.len();
        }
        assert_eq!(offset, 501);
    }

    #[tokio::test]
    async fn test_short_source_ends_early() {
        // Declared length is larger than what the reader can supply.
        let data = sample(300);
        let range = parse_range_header(None, 1000);
        let session = StreamSession::open(reader(&data), range, 128).await.unwrap();

        let mut sink = RecordingSink::default();
        let written = session.run(&mut sink).await.unwrap();
        assert_eq!(written, 300);
        assert_eq!(sink.bytes(), data);
    }

    #[tokio::test]
    async fn test_seek_failure_is_reported_before_any_write() {
        let range = parse_range_header(Some("bytes=5-9"), 10);
        let result =
            StreamSession::open(Box::new(BrokenReader { fail_seek: true }), range, 16).await;

        match result {
            Err(StreamError::Seek { position, .. }) => assert_eq!(position, 5),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("seek should fail"),
        }
    }

    #[tokio::test]
    async fn test_read_failure_aborts_session() {
        let range = parse_range_header(None, 10);
        let session = StreamSession::open(Box::new(BrokenReader { fail_seek: false }), range, 16)
            .await
            .unwrap();

        let mut sink = RecordingSink::default();
        let error = session.run(&mut sink).await.unwrap_err();
        assert!(matches!(error, StreamError::Read { position: 0, .. }));
        assert!(sink.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_client_write_failure_aborts_session() {
        let data = sample(20);
        let writer = tokio_test::io::Builder::new()
            .write(&data[..8])
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "reset by peer"))
            .build();
        let mut sink = WriterSink::new(writer);

        let range = parse_range_header(None, 20);
        let session = StreamSession::open(reader(&data), range, 8).await.unwrap();

        let error = session.run(&mut sink).await.unwrap_err();
        assert!(error.is_client_disconnect());
    }

    #[tokio::test]
    async fn test_lease_released_when_session_ends() {
        let leases = BundleLeases::new();
        let data = sample(64);
        let range = parse_range_header(None, 64);
        let session = StreamSession::open(reader(&data), range, 16)
            .await
            .unwrap()
            .with_lease(leases.acquire("bundle"));
        assert!(leases.is_leased("bundle"));

        let mut sink = RecordingSink::default();
        session.run(&mut sink).await.unwrap();
        assert!(!leases.is_leased("bundle"));
    }

    #[tokio::test]
    async fn test_lease_released_on_failure() {
        let leases = BundleLeases::new();
        let range = parse_range_header(None, 10);
        let session = StreamSession::open(Box::new(BrokenReader { fail_seek: false }), range, 4)
            .await
            .unwrap()
            .with_lease(leases.acquire("bundle"));

        let mut sink = RecordingSink::default();
        assert!(session.run(&mut sink).await.is_err());
        assert!(!leases.is_leased("bundle"));
    }
}
