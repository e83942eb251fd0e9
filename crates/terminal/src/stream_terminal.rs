//! The stream terminal: three borrowed endpoints, binary and text views,
//! one-way lifecycle, one shared cancellation signal.
//!
//! Every public operation is gated on the lifecycle state. Reads and writes
//! `select!` against the terminal's cancellation token so `destroy()` never
//! waits behind a stalled stream, and per-channel async mutexes serialize
//! writes so sequential calls on one channel complete in issuance order.

use crate::endpoint::{ByteSink, ByteSource, SinkGuard, SourceGuard};
use crate::error::{Channel, TerminalError};
use crate::text::Utf8Decoder;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use util::debug_panic;

/// Maximum bytes pulled from the input endpoint per read call.
const READ_CHUNK_SIZE: usize = 8192;

/// Terminal lifecycle. Transitions are one-way:
/// `Uninitialized → Initialized → Destroyed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum State {
    Uninitialized = 0,
    Initialized = 1,
    Destroyed = 2,
}

impl State {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            _ => Self::Destroyed,
        }
    }
}

/// Data accepted by the write operations: text is routed through the UTF-8
/// text view, raw bytes go straight to the binary writer. Both land on the
/// same underlying sink, so the two forms may be interleaved on one channel
/// and complete in issuance order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(bytes: &[u8; N]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Exclusive input handles plus the text decoder layered on top of them.
struct InputChannel {
    reader: SourceGuard,
    decoder: Utf8Decoder,
    /// Set once the source reports end of stream.
    eof: bool,
}

impl InputChannel {
    fn new(reader: SourceGuard) -> Self {
        Self {
            reader,
            decoder: Utf8Decoder::default(),
            eof: false,
        }
    }

    /// Next raw chunk, `None` on end of stream or cancellation.
    async fn read_chunk(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, TerminalError> {
        if self.eof {
            return Ok(None);
        }
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            read = self.reader.read(&mut buffer) => match read {
                Ok(0) => {
                    self.eof = true;
                    Ok(None)
                }
                Ok(count) => {
                    buffer.truncate(count);
                    Ok(Some(buffer))
                }
                Err(source) => Err(TerminalError::Stream {
                    channel: Channel::Input,
                    source,
                }),
            },
        }
    }

    /// Next decoded text chunk, `None` on end of stream or cancellation.
    async fn read_text(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, TerminalError> {
        loop {
            match self.read_chunk(cancel).await? {
                Some(bytes) => {
                    let text = self.decoder.decode(&bytes);
                    // A chunk can be entirely a partial code point; keep
                    // reading instead of surfacing an empty chunk.
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                None => {
                    let tail = self.decoder.flush();
                    return Ok(if tail.is_empty() { None } else { Some(tail) });
                }
            }
        }
    }
}

/// Exclusive write handle for one output-side channel.
struct OutputChannel {
    writer: SinkGuard,
    channel: Channel,
}

impl OutputChannel {
    async fn write(
        &mut self,
        cancel: &CancellationToken,
        payload: &Payload,
    ) -> Result<(), TerminalError> {
        // Absent/empty data is a legal call that writes nothing.
        if payload.is_empty() {
            return Ok(());
        }
        let channel = self.channel;
        let bytes = payload.as_bytes();
        let writer = &mut self.writer;
        tokio::select! {
            _ = cancel.cancelled() => Err(TerminalError::Destroyed),
            result = async move {
                writer.write_all(bytes).await?;
                // Flush so the bytes are observable on the endpoint once the
                // call returns.
                writer.flush().await
            } => result.map_err(|source| TerminalError::Stream { channel, source }),
        }
    }
}

type OutputSlot = Arc<AsyncMutex<Option<OutputChannel>>>;

/// A managed view over a process's input, output, and error streams.
///
/// The three endpoints are borrowed for the lifetime of one initialized
/// period: `initialize()` acquires an exclusive handle on each,
/// `destroy()` releases them all without closing the underlying streams.
/// Each channel exposes both a raw-binary and a UTF-8 text operation set.
///
/// The lifecycle is strictly one-way — a destroyed terminal cannot be
/// re-initialized.
pub struct StreamTerminal {
    state: AtomicU8,
    cancel: CancellationToken,
    input: Arc<AsyncMutex<Option<InputChannel>>>,
    output: OutputSlot,
    error: OutputSlot,
}

impl Default for StreamTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTerminal {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Uninitialized as u8),
            cancel: CancellationToken::new(),
            input: Arc::new(AsyncMutex::new(None)),
            output: Arc::new(AsyncMutex::new(None)),
            error: Arc::new(AsyncMutex::new(None)),
        }
    }

    /// Whether the terminal is currently usable for reads and writes.
    pub fn is_initialized(&self) -> bool {
        self.state() == State::Initialized
    }

    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    fn ensure_initialized(&self) -> Result<(), TerminalError> {
        match self.state() {
            State::Initialized => Ok(()),
            State::Uninitialized => Err(TerminalError::NotInitialized),
            State::Destroyed => Err(TerminalError::Destroyed),
        }
    }

    /// The lifecycle error matching the current (non-initialized) state.
    fn lifecycle_error(&self) -> TerminalError {
        match self.state() {
            State::Destroyed => TerminalError::Destroyed,
            _ => TerminalError::NotInitialized,
        }
    }

    /// Bind the terminal to three endpoints, acquiring an exclusive handle
    /// on each.
    ///
    /// Idempotent while initialized: a second call returns without touching
    /// the endpoints. Fails with [`TerminalError::Acquisition`] if any
    /// endpoint is already locked elsewhere; handles acquired before the
    /// failure are released on the way out and the terminal stays
    /// uninitialized. A destroyed terminal cannot be re-initialized.
    pub async fn initialize(
        &self,
        input: ByteSource,
        output: ByteSink,
        error: ByteSink,
    ) -> Result<(), TerminalError> {
        match self.state() {
            State::Initialized => return Ok(()),
            State::Destroyed => return Err(TerminalError::Destroyed),
            State::Uninitialized => {}
        }

        let reader = input.try_lock_owned().map_err(|_| TerminalError::Acquisition {
            channel: Channel::Input,
        })?;
        let output_writer = output
            .try_lock_owned()
            .map_err(|_| TerminalError::Acquisition {
                channel: Channel::Output,
            })?;
        let error_writer = error
            .try_lock_owned()
            .map_err(|_| TerminalError::Acquisition {
                channel: Channel::Error,
            })?;

        *self.input.lock().await = Some(InputChannel::new(reader));
        *self.output.lock().await = Some(OutputChannel {
            writer: output_writer,
            channel: Channel::Output,
        });
        *self.error.lock().await = Some(OutputChannel {
            writer: error_writer,
            channel: Channel::Error,
        });

        self.state.store(State::Initialized as u8, Ordering::Release);
        tracing::debug!("stream terminal initialized");
        Ok(())
    }

    /// Tear the terminal down and release every handle.
    ///
    /// The state flips to destroyed before anything is released, so
    /// concurrent operations fail fast instead of touching freed handles;
    /// the shared cancellation signal then stops all three channels at
    /// once. Best-effort: release failures are logged, never propagated,
    /// and one failure does not stop the remaining releases. The underlying
    /// endpoints are left open — they are borrowed, not owned. Idempotent.
    pub async fn destroy(&self) {
        if self
            .state
            .compare_exchange(
                State::Initialized as u8,
                State::Destroyed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        // Stop all three channels at once. In-flight reads and writes
        // resolve through their cancellation branch, releasing the slot
        // locks we are about to take.
        self.cancel.cancel();

        match self.input.lock().await.take() {
            // Dropping the channel releases the exclusive handle on the
            // binary source without closing it; the text decoder and any
            // held-back partial bytes go with it.
            Some(channel) => drop(channel),
            None => debug_panic!("initialized terminal had no input channel"),
        }
        Self::release_writer(self.output.lock().await.take(), Channel::Output).await;
        Self::release_writer(self.error.lock().await.take(), Channel::Error).await;
        tracing::debug!("stream terminal destroyed");
    }

    /// Flush and release one output-side channel, best-effort.
    async fn release_writer(channel: Option<OutputChannel>, name: Channel) {
        let Some(mut channel) = channel else {
            debug_panic!("initialized terminal had no {} channel", name);
            return;
        };
        if let Err(error) = channel.writer.flush().await {
            tracing::debug!(%error, channel = %name, "flush failed during destroy");
        }
        // Dropping the guard releases the sink without closing it.
    }

    /// Write to the output endpoint, awaiting completion.
    pub async fn write_output(&self, data: impl Into<Payload>) -> Result<(), TerminalError> {
        self.write(&self.output, data.into()).await
    }

    /// Write `parts` joined by single spaces plus a trailing newline to the
    /// output endpoint.
    pub async fn write_output_line<I>(&self, parts: I) -> Result<(), TerminalError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.write(&self.output, Payload::Text(join_line(parts))).await
    }

    /// Write to the error endpoint, awaiting completion.
    pub async fn write_error(&self, data: impl Into<Payload>) -> Result<(), TerminalError> {
        self.write(&self.error, data.into()).await
    }

    /// Write `parts` joined by single spaces plus a trailing newline to the
    /// error endpoint.
    pub async fn write_error_line<I>(&self, parts: I) -> Result<(), TerminalError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.write(&self.error, Payload::Text(join_line(parts))).await
    }

    /// Enqueue a write to the output endpoint without awaiting completion.
    ///
    /// Fire-and-forget: no backpressure, no completion signal, and write
    /// failures are logged rather than returned. Intended for best-effort
    /// diagnostics where the caller cannot wait (e.g. shutdown paths). The
    /// lifecycle check still happens synchronously. Must be called from
    /// within a Tokio runtime.
    pub fn write_output_sync(&self, data: impl Into<Payload>) -> Result<(), TerminalError> {
        self.write_sync(&self.output, data.into())
    }

    /// Line-oriented variant of [`write_output_sync`](Self::write_output_sync).
    pub fn write_output_line_sync<I>(&self, parts: I) -> Result<(), TerminalError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.write_sync(&self.output, Payload::Text(join_line(parts)))
    }

    /// Enqueue a write to the error endpoint without awaiting completion.
    ///
    /// Same weak contract as [`write_output_sync`](Self::write_output_sync).
    pub fn write_error_sync(&self, data: impl Into<Payload>) -> Result<(), TerminalError> {
        self.write_sync(&self.error, data.into())
    }

    /// Line-oriented variant of [`write_error_sync`](Self::write_error_sync).
    pub fn write_error_line_sync<I>(&self, parts: I) -> Result<(), TerminalError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.write_sync(&self.error, Payload::Text(join_line(parts)))
    }

    /// Read the next raw chunk from the input endpoint.
    ///
    /// Suspends until data is available. Returns `Ok(None)` at end of
    /// stream, or when the terminal's cancellation signal fires mid-read.
    pub async fn read_input(&self) -> Result<Option<Vec<u8>>, TerminalError> {
        self.ensure_initialized()?;
        let mut slot = self.input.lock().await;
        let Some(channel) = slot.as_mut() else {
            return Err(self.lifecycle_error());
        };
        channel.read_chunk(&self.cancel).await
    }

    /// Read the next decoded text chunk from the input endpoint.
    ///
    /// Suspends until data is available. Returns `Ok(None)` at end of
    /// stream, or when the terminal's cancellation signal fires mid-read.
    /// A trailing code point cut off by end of stream decodes to U+FFFD.
    pub async fn read_input_text(&self) -> Result<Option<String>, TerminalError> {
        self.ensure_initialized()?;
        let mut slot = self.input.lock().await;
        let Some(channel) = slot.as_mut() else {
            return Err(self.lifecycle_error());
        };
        channel.read_text(&self.cancel).await
    }

    async fn write(&self, slot: &OutputSlot, payload: Payload) -> Result<(), TerminalError> {
        self.ensure_initialized()?;
        let mut guard = slot.lock().await;
        let Some(channel) = guard.as_mut() else {
            return Err(self.lifecycle_error());
        };
        channel.write(&self.cancel, &payload).await
    }

    fn write_sync(&self, slot: &OutputSlot, payload: Payload) -> Result<(), TerminalError> {
        self.ensure_initialized()?;
        let slot = Arc::clone(slot);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut guard = slot.lock().await;
            // The terminal may have been destroyed while this task waited
            // its turn; the write is best-effort, so just drop it.
            let Some(channel) = guard.as_mut() else {
                return;
            };
            if let Err(error) = channel.write(&cancel, &payload).await {
                tracing::warn!(%error, "fire-and-forget write failed");
            }
        });
        Ok(())
    }
}

/// Join parts with single spaces and append a newline.
fn join_line<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut line = String::new();
    for (index, part) in parts.into_iter().enumerate() {
        if index > 0 {
            line.push(' ');
        }
        line.push_str(part.as_ref());
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_line_joins_with_spaces_and_newline() {
        assert_eq!(join_line(["a", "b"]), "a b\n");
        assert_eq!(join_line(["one"]), "one\n");
        assert_eq!(join_line(Vec::<&str>::new()), "\n");
    }

    #[test]
    fn payload_conversions() {
        assert_eq!(Payload::from("hi"), Payload::Text("hi".to_string()));
        assert_eq!(
            Payload::from("hi".to_string()),
            Payload::Text("hi".to_string())
        );
        assert_eq!(Payload::from(vec![1u8, 2]), Payload::Bytes(vec![1, 2]));
        assert_eq!(Payload::from(b"ab"), Payload::Bytes(vec![b'a', b'b']));
    }

    #[test]
    fn payload_emptiness() {
        assert!(Payload::from("").is_empty());
        assert!(Payload::from(Vec::new()).is_empty());
        assert!(!Payload::from("x").is_empty());
    }

    #[test]
    fn state_round_trip() {
        assert_eq!(State::from_u8(State::Uninitialized as u8), State::Uninitialized);
        assert_eq!(State::from_u8(State::Initialized as u8), State::Initialized);
        assert_eq!(State::from_u8(State::Destroyed as u8), State::Destroyed);
    }

    #[tokio::test]
    async fn fresh_terminal_is_uninitialized() {
        let terminal = StreamTerminal::new();
        assert!(!terminal.is_initialized());
        let error = terminal.read_input().await.expect_err("should fail");
        assert!(matches!(error, TerminalError::NotInitialized));
    }
}
