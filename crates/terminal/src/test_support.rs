//! In-memory endpoints for exercising the terminal without real stdio.
//!
//! Only compiled for tests or with the `test-support` feature.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Sink that records everything written into a shared buffer.
///
/// Clones share the same buffer, so a test can keep one handle while boxing
/// another into an endpoint. Also tracks whether anything ever called
/// shutdown on it, which lets tests assert that destroying a terminal does
/// not close its borrowed endpoints.
#[derive(Clone, Default)]
pub struct CaptureSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Whether shutdown was ever called on this sink.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl AsyncWrite for CaptureSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buffer.lock().extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown.store(true, Ordering::Release);
        Poll::Ready(Ok(()))
    }
}

/// Source that yields a scripted sequence of chunks, one per read.
///
/// After the chunks run out it reports end of stream, or stays pending
/// forever when built with [`ChunkedSource::pending_after_chunks`] — useful
/// for cancellation tests where the read must still be in flight.
pub struct ChunkedSource {
    chunks: VecDeque<Vec<u8>>,
    pending_after: bool,
}

impl ChunkedSource {
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            pending_after: false,
        }
    }

    /// Like [`new`](Self::new), but never signals end of stream.
    pub fn pending_after_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            pending_after: true,
        }
    }
}

impl AsyncRead for ChunkedSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            if self.pending_after {
                // Stay pending; the test's cancellation wakes the task.
                return Poll::Pending;
            }
            return Poll::Ready(Ok(()));
        };
        if chunk.len() > buf.remaining() {
            let rest = chunk.split_off(buf.remaining());
            self.chunks.push_front(rest);
        }
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

/// Sink whose writes always fail with a broken pipe.
#[derive(Default)]
pub struct FailingSink;

impl AsyncWrite for FailingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
