//! Stream terminal core.
//!
//! Binds three borrowed byte-stream endpoints (input, output, error) into a
//! managed pipeline with both binary and text views, exclusive handle
//! locking, and one shared cancellation signal. This crate is the stream
//! plumbing layer only — no process spawning, no rendering.

pub mod endpoint;
pub mod error;
mod stream_terminal;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
mod text;

pub use endpoint::{sink, source, stdio, ByteSink, ByteSource};
pub use error::{Channel, TerminalError};
pub use stream_terminal::{Payload, StreamTerminal};
