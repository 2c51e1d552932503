//! Stage streams - unidirectional byte pipes between adjacent stages
//!
//! Built on `tokio::io::duplex`, so a pipe only buffers `capacity` bytes:
//! a writer suspends until the reader drains the buffer. Dropping either
//! endpoint closes it:
//! - reader side observes EOF once the writer is shut down
//! - reader side fails with `ConnectionAborted` if the writer is dropped
//!   without a shutdown, so a failed producer never looks like a complete
//!   stream
//! - writer side fails with `BrokenPipe` once the reader is dropped

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::ModuleError;

/// Default pipe capacity, the usual kernel pipe buffer size
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Byte counters shared by both endpoints of a pipe
#[derive(Debug, Default)]
pub struct StreamStats {
    written: AtomicU64,
    read: AtomicU64,
    finished: AtomicBool,
}

impl StreamStats {
    /// Bytes accepted by the writer endpoint
    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Bytes delivered to the reader endpoint
    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Whether the writer shut the stream down cleanly
    pub fn writer_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Create a pipe buffering at most `capacity` bytes
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (write_half, read_half) = tokio::io::duplex(capacity.max(1));
    let stats = Arc::new(StreamStats::default());
    (
        PipeWriter {
            inner: write_half,
            stats: Arc::clone(&stats),
        },
        PipeReader {
            inner: read_half,
            stats,
        },
    )
}

/// Write endpoint of a stage pipe
#[derive(Debug)]
pub struct PipeWriter {
    inner: DuplexStream,
    stats: Arc<StreamStats>,
}

impl PipeWriter {
    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.stats.written.fetch_add(*n as u64, Ordering::Relaxed);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // must be visible before the reader can observe EOF
        self.stats.finished.store(true, Ordering::Release);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Read endpoint of a stage pipe
#[derive(Debug)]
pub struct PipeReader {
    inner: DuplexStream,
    stats: Arc<StreamStats>,
}

impl PipeReader {
    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let wanted = buf.remaining() > 0;
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let n = buf.filled().len() - before;
            if n == 0 && wanted && !this.stats.writer_finished() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "upstream stage aborted",
                )));
            }
            this.stats.read.fetch_add(n as u64, Ordering::Relaxed);
        }
        poll
    }
}

/// Check the endpoint shape of a source stage and keep its writer
pub fn bind_source(
    writer: Option<PipeWriter>,
    reader: Option<PipeReader>,
) -> Result<PipeWriter, ModuleError> {
    if reader.is_some() {
        return Err(ModuleError::UnexpectedEndpoint("reader"));
    }
    writer.ok_or(ModuleError::MissingEndpoint("writer"))
}

/// Check the endpoint shape of a transform stage and keep both endpoints
pub fn bind_transform(
    writer: Option<PipeWriter>,
    reader: Option<PipeReader>,
) -> Result<(PipeWriter, PipeReader), ModuleError> {
    match (writer, reader) {
        (Some(writer), Some(reader)) => Ok((writer, reader)),
        (None, _) => Err(ModuleError::MissingEndpoint("writer")),
        (_, None) => Err(ModuleError::MissingEndpoint("reader")),
    }
}

/// Check the endpoint shape of a sink stage and keep its reader
pub fn bind_sink(
    writer: Option<PipeWriter>,
    reader: Option<PipeReader>,
) -> Result<PipeReader, ModuleError> {
    if writer.is_some() {
        return Err(ModuleError::UnexpectedEndpoint("writer"));
    }
    reader.ok_or(ModuleError::MissingEndpoint("reader"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_pipe_delivers_bytes_in_order() {
        let (mut writer, mut reader) = pipe(8);
        let producer = tokio::spawn(async move {
            writer.write_all(b"0123456789abcdef").await.unwrap();
            writer.shutdown().await.unwrap();
            writer
        });

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        let writer = producer.await.unwrap();

        assert_eq!(received, b"0123456789abcdef");
        assert_eq!(writer.stats().bytes_written(), 16);
        assert_eq!(reader.stats().bytes_read(), 16);
    }

    #[tokio::test]
    async fn test_shutdown_signals_eof() {
        let (mut writer, mut reader) = pipe(64);
        writer.write_all(b"tail").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"tail");
        assert!(reader.stats().writer_finished());
    }

    #[tokio::test]
    async fn test_dropping_writer_without_shutdown_aborts_reader() {
        let (mut writer, mut reader) = pipe(64);
        writer.write_all(b"partial").await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        let err = reader.read_to_end(&mut received).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        // buffered bytes are still delivered before the abort
        assert_eq!(received, b"partial");
    }

    #[tokio::test]
    async fn test_dropping_reader_breaks_writer() {
        let (mut writer, reader) = pipe(4);
        drop(reader);

        let err = writer.write_all(b"more than four bytes").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_bind_shapes() {
        let (writer, reader) = pipe(16);
        assert!(matches!(
            bind_source(Some(writer), Some(reader)),
            Err(ModuleError::UnexpectedEndpoint("reader"))
        ));
        assert!(matches!(
            bind_sink(None, None),
            Err(ModuleError::MissingEndpoint("reader"))
        ));
        assert!(matches!(
            bind_transform(None, None),
            Err(ModuleError::MissingEndpoint("writer"))
        ));
    }
}
