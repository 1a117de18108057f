//! Error types for the serial link.

use std::io;

use thiserror::Error;

/// Errors raised while talking to the sensor over its serial line.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened.
    #[error("failed to open serial port {port}: {source}")]
    Open {
        /// Device path that failed to open.
        port: String,
        /// Underlying serial error.
        #[source]
        source: serialport::Error,
    },

    /// Configuring the open port failed.
    #[error("failed to configure serial port: {0}")]
    Control(#[from] serialport::Error),

    /// The channel is gone for good; no further reads or writes can succeed.
    #[error("serial link closed: {reason}")]
    Closed {
        /// Description of how the closure was detected.
        reason: String,
    },

    /// A transient I/O failure.
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LinkError {
    /// Builds a closure error.
    #[must_use]
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Whether the link can never recover from this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Coarse classification used to suppress repeated warnings.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Open { .. } | Self::Control(_) => io::ErrorKind::Other,
            Self::Closed { .. } => io::ErrorKind::BrokenPipe,
            Self::Io(error) => error.kind(),
        }
    }

    /// Sorts an I/O failure into transient or fatal.
    pub(crate) fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::closed(error.to_string()),
            _ => Self::Io(error),
        }
    }
}
