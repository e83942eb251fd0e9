//! Byte-stream endpoint handles.
//!
//! An endpoint is a shared, lockable handle around an async byte stream.
//! [`StreamTerminal`](crate::StreamTerminal) acquires exclusive access to
//! each endpoint for the lifetime of one initialized period and releases it
//! on destroy without closing the underlying stream — endpoints are
//! borrowed, never owned. Dropping the owned guard is the release; nothing
//! ever calls shutdown on the stream itself.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A readable byte-stream endpoint (conventionally stdin).
pub type ByteSource = Arc<Mutex<Box<dyn AsyncRead + Send + Unpin>>>;

/// A writable byte-stream endpoint (conventionally stdout or stderr).
pub type ByteSink = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Exclusive read handle held while a terminal is initialized.
pub(crate) type SourceGuard = OwnedMutexGuard<Box<dyn AsyncRead + Send + Unpin>>;

/// Exclusive write handle held while a terminal is initialized.
pub(crate) type SinkGuard = OwnedMutexGuard<Box<dyn AsyncWrite + Send + Unpin>>;

/// Wrap a readable stream as a shareable source endpoint.
pub fn source(read: impl AsyncRead + Send + Unpin + 'static) -> ByteSource {
    Arc::new(Mutex::new(Box::new(read) as Box<dyn AsyncRead + Send + Unpin>))
}

/// Wrap a writable stream as a shareable sink endpoint.
pub fn sink(write: impl AsyncWrite + Send + Unpin + 'static) -> ByteSink {
    Arc::new(Mutex::new(Box::new(write) as Box<dyn AsyncWrite + Send + Unpin>))
}

/// The conventional process-stdio wiring: `(stdin, stdout, stderr)`.
///
/// The terminal itself is agnostic to how its endpoints were obtained; this
/// is just the common case.
pub fn stdio() -> (ByteSource, ByteSink, ByteSink) {
    (
        source(tokio::io::stdin()),
        sink(tokio::io::stdout()),
        sink(tokio::io::stderr()),
    )
}
