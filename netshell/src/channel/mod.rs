//! Channel layer: buffered reading, prompt synchronization and sanitizing.
//!
//! A shell channel is just two halves: something that yields chunks of
//! terminal output and something that accepts bytes. The SSH transport
//! provides the production implementation; anything else that can speak
//! a PTY stream (a serial console, a test double) can plug in here.

mod buffer;
#[cfg(test)]
pub(crate) mod mock;
mod patterns;
mod pty;
mod reader;
mod sanitize;

pub use buffer::PatternBuffer;
pub use patterns::strip_control;
pub use pty::{ExecGuard, PtyChannel, PtyConfig};
pub use sanitize::{CleanOutput, clean_output, sanitize};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Output side of a shell channel.
#[async_trait]
pub trait ShellReader: Send {
    /// Wait for the next chunk of output.
    ///
    /// Returns `Ok(None)` once the remote side has closed the stream.
    /// Implementations must be cancel-safe: the reader task drops this
    /// future when its poll window elapses.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Input side of a shell channel.
#[async_trait]
pub trait ShellWriter: Send + Sync {
    /// Write bytes to the remote terminal.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Tear down the channel and the connection behind it.
    async fn close(&self) -> Result<()>;

    /// Whether the underlying connection still looks alive.
    fn is_alive(&self) -> bool {
        true
    }
}
