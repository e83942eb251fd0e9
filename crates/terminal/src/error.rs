//! Error taxonomy for terminal operations.

use std::fmt;
use thiserror::Error;

/// The three communication channels a terminal owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Input,
    Output,
    Error,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Input => "input",
            Channel::Output => "output",
            Channel::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Errors surfaced by [`StreamTerminal`](crate::StreamTerminal) operations.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// An operation that requires an initialized terminal was called before
    /// `initialize()` completed.
    #[error("terminal is not initialized")]
    NotInitialized,

    /// The terminal was destroyed; it can no longer be used or
    /// re-initialized.
    #[error("terminal has been destroyed")]
    Destroyed,

    /// `initialize()` could not get exclusive access to an endpoint,
    /// usually because another holder already has it locked. The terminal
    /// stays uninitialized and releases anything it acquired first.
    #[error("could not acquire exclusive access to the {channel} endpoint")]
    Acquisition { channel: Channel },

    /// An underlying read or write primitive failed (e.g. broken pipe).
    /// The terminal stays initialized; the caller decides whether to
    /// destroy it.
    #[error("{channel} stream fault: {source}")]
    Stream {
        channel: Channel,
        #[source]
        source: std::io::Error,
    },
}

impl TerminalError {
    /// Whether this is a lifecycle error (operation in the wrong state)
    /// rather than an I/O fault.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::Destroyed)
    }
}
