//! The physical channel to the sensor.
//!
//! A [`LineSource`] is split once at startup: the reader half goes to the
//! ingest loop and the writer half to the command dispatcher. Neither half
//! is shared, so the serial device never sees interleaved reads from two
//! owners.

mod error;
mod serial;

use std::time::Duration;

pub use error::LinkError;
pub use serial::{SerialSettings, open_serial};

/// Log target for link operations.
pub(crate) const LINK_TARGET: &str = "biolink_sensor::link";

/// Receiving half of the link.
pub trait LineReader: Send {
    /// Reports, without blocking, whether a read would make progress: bytes
    /// are waiting or the channel has closed.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the device cannot be queried.
    fn has_input(&mut self) -> Result<bool, LinkError>;

    /// Reads one raw line, blocking for at most `timeout`.
    ///
    /// Returns `Ok(None)` when no complete line arrived in time. The returned
    /// bytes may still carry the line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] once the channel is permanently gone and
    /// other variants for transient failures.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError>;
}

/// Sending half of the link.
pub trait LineWriter: Send {
    /// Writes `line` in full and flushes it to the device.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the bytes cannot be delivered.
    fn write_line(&mut self, line: &[u8]) -> Result<(), LinkError>;
}

/// An open channel prior to being split between its two owners.
pub struct LineSource {
    reader: Box<dyn LineReader>,
    writer: Box<dyn LineWriter>,
}

impl LineSource {
    /// Pairs a reader and a writer for the same device.
    #[must_use]
    pub fn new(reader: Box<dyn LineReader>, writer: Box<dyn LineWriter>) -> Self {
        Self { reader, writer }
    }

    /// Separates the channel into its reader and writer halves.
    #[must_use]
    pub fn split(self) -> (Box<dyn LineReader>, Box<dyn LineWriter>) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("LineSource").finish_non_exhaustive()
    }
}
