//! streamterm — echo shell over the stream terminal core.
//!
//! Reads from stdin and echoes each chunk back on stdout until end of
//! stream, then reports totals on the error channel. The library crate
//! `terminal` is the product; this binary is its smallest real consumer.

use anyhow::{Context, Result};
use terminal::{endpoint, StreamTerminal, TerminalError};
use tracing::{debug, info};

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("STREAMTERM_DEBUG").is_ok()
}

/// Initialize the logging system.
///
/// Logs go to stderr so they interleave with (but never corrupt) the
/// terminal's own error channel, which shares the same file descriptor.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if is_debug_mode() {
        "terminal=trace,streamterm=debug,info"
    } else {
        "terminal=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Echo decoded input back to the output channel until end of stream.
async fn echo_loop(terminal: &StreamTerminal) -> Result<(), TerminalError> {
    let mut lines: u64 = 0;
    let mut bytes: u64 = 0;

    while let Some(text) = terminal.read_input_text().await? {
        bytes += text.len() as u64;
        lines += text.matches('\n').count() as u64;
        terminal.write_output(text).await?;
    }
    debug!(lines, bytes, "input stream ended");

    terminal
        .write_error_line([
            "echoed".to_string(),
            lines.to_string(),
            "line(s),".to_string(),
            bytes.to_string(),
            "byte(s)".to_string(),
        ])
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("streamterm starting");

    let terminal = StreamTerminal::new();
    let (input, output, error) = endpoint::stdio();
    terminal
        .initialize(input, output, error)
        .await
        .context("failed to initialize terminal on stdio")?;

    let result = echo_loop(&terminal).await;

    // Best-effort goodbye on the way out; destroy() must still run even if
    // the loop failed, and never blocks on this write completing.
    if result.is_ok() {
        let _ = terminal.write_error_line_sync(["bye"]);
    }
    terminal.destroy().await;

    result.context("terminal session failed")?;
    info!("streamterm exiting");
    Ok(())
}
