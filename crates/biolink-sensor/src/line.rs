//! Timestamped lines received from the sensor.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A single decoded line from the serial link.
///
/// Lines are created by the ingest loop (or by the dispatcher for its own
/// status messages) and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    text: String,
    received_at: OffsetDateTime,
}

impl Line {
    /// Stamps `text` with the current UTC time.
    #[must_use]
    pub fn now(text: impl Into<String>) -> Self {
        Self::at(text, OffsetDateTime::now_utc())
    }

    /// Builds a line with an explicit arrival time.
    #[must_use]
    pub fn at(text: impl Into<String>, received_at: OffsetDateTime) -> Self {
        Self {
            text: text.into(),
            received_at,
        }
    }

    /// Decodes raw bytes permissively and trims surrounding whitespace.
    ///
    /// Returns `None` when nothing but whitespace remains.
    #[must_use]
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let decoded = String::from_utf8_lossy(raw);
        let trimmed = decoded.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::now(trimmed))
        }
    }

    /// Line content without its terminator.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Arrival time rendered as RFC 3339.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.received_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.received_at.unix_timestamp().to_string())
    }

    /// Serializable view used by observers of the log.
    #[must_use]
    pub fn entry(&self) -> LogEntry {
        LogEntry {
            text: self.text.clone(),
            timestamp: self.timestamp(),
        }
    }
}

/// Wire form of a logged line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Line content.
    pub text: String,
    /// RFC 3339 arrival time.
    pub timestamp: String,
}
