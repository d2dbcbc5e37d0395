//! Output sinks for stream sessions.
//!
//! A sink must accept incremental writes and an explicit flush; a session
//! flushes after every chunk so the client sees progress while the content
//! source is still filling in the file behind the read position.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Destination of a stream session's bytes.
#[async_trait]
pub trait StreamSink: Send {
    /// Hands one chunk to the sink. It may be buffered until [`StreamSink::flush`].
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the receiving end is gone
    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Pushes everything written so far towards the client.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the receiving end is gone
    async fn flush(&mut self) -> io::Result<()>;
}

/// Response body fed by a [`ChannelSink`].
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Sink backed by a bounded channel whose receiving half is an HTTP body stream.
///
/// With a small capacity, a flush waits until the client has pulled the
/// previous chunk, which throttles reading to the client's pace.
pub struct ChannelSink {
    sender: mpsc::Sender<io::Result<Bytes>>,
    staged: Vec<Bytes>,
}

impl ChannelSink {
    /// Creates a sink and the body stream it feeds.
    pub fn channel(capacity: usize) -> (Self, BodyStream) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let body = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed();

        (
            Self {
                sender,
                staged: Vec::new(),
            },
            body,
        )
    }

    /// Terminates the body with an error so the connection is torn down
    /// instead of ending cleanly with fewer bytes than announced.
    pub async fn abort(self, error: io::Error) {
        // Receiver already gone means the client left; nothing to tear down.
        let _ = self.sender.send(Err(error)).await;
    }

    fn disconnected() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
    }
}

#[async_trait]
impl StreamSink for ChannelSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.sender.is_closed() {
            return Err(Self::disconnected());
        }
        self.staged.push(chunk);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        for chunk in self.staged.drain(..) {
            self.sender
                .send(Ok(chunk))
                .await
                .map_err(|_| Self::disconnected())?;
        }
        Ok(())
    }
}

/// Sink over any tokio writer.
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> StreamSink for WriterSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn write_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.writer.write_all(&chunk).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}
