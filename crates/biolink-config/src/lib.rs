//! Shared configuration for the biolink sensor host.
//!
//! Values are layered by `ortho_config`: command-line flags override
//! `BIOLINK_*` environment variables, which override the configuration file,
//! which overrides the built-in defaults in [`defaults`].

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_BAUD_RATE, DEFAULT_ENROLL_TIMEOUT_MS, DEFAULT_LOG_CAPACITY, DEFAULT_LOG_FILTER,
    DEFAULT_PENDING_CAPACITY, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SEARCH_TIMEOUT_MS,
    DEFAULT_SERIAL_PORT, DEFAULT_SETTLE_MS, DEFAULT_TCP_PORT, default_baud_rate,
    default_control_socket, default_enroll_timeout_ms, default_log_capacity, default_log_filter,
    default_log_format, default_pending_capacity, default_read_timeout_ms, default_records_path,
    default_search_timeout_ms, default_serial_port, default_settle_ms,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Configuration consumed by the `biolinkd` daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BIOLINK")]
pub struct Config {
    /// Serial device the sensor is attached to.
    #[serde(default = "default_serial_port")]
    #[ortho_config(default = default_serial_port())]
    pub serial_port: String,
    /// Line speed of the serial device.
    #[serde(default = "default_baud_rate")]
    #[ortho_config(default = default_baud_rate())]
    pub baud_rate: u32,
    /// Milliseconds to wait for the board reset after opening the port.
    #[serde(default = "default_settle_ms")]
    #[ortho_config(default = default_settle_ms())]
    pub settle_ms: u64,
    /// Milliseconds a single line read may block.
    #[serde(default = "default_read_timeout_ms")]
    #[ortho_config(default = default_read_timeout_ms())]
    pub read_timeout_ms: u64,
    /// Milliseconds to wait for an enrollment confirmation.
    #[serde(default = "default_enroll_timeout_ms")]
    #[ortho_config(default = default_enroll_timeout_ms())]
    pub enroll_timeout_ms: u64,
    /// Milliseconds to wait for a search verdict.
    #[serde(default = "default_search_timeout_ms")]
    #[ortho_config(default = default_search_timeout_ms())]
    pub search_timeout_ms: u64,
    /// Number of log lines retained for observers.
    #[serde(default = "default_log_capacity")]
    #[ortho_config(default = default_log_capacity())]
    pub log_capacity: usize,
    /// Number of unclaimed lines retained for correlation.
    #[serde(default = "default_pending_capacity")]
    #[ortho_config(default = default_pending_capacity())]
    pub pending_capacity: usize,
    /// JSON file holding enrolled identities.
    #[serde(default = "default_records_path")]
    #[ortho_config(default = default_records_path())]
    pub records_path: Utf8PathBuf,
    /// Endpoint the daemon listens on for control requests.
    #[serde(default = "default_control_socket")]
    #[ortho_config(default = default_control_socket())]
    pub control_socket: SocketEndpoint,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter")]
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            settle_ms: default_settle_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            enroll_timeout_ms: default_enroll_timeout_ms(),
            search_timeout_ms: default_search_timeout_ms(),
            log_capacity: default_log_capacity(),
            pending_capacity: default_pending_capacity(),
            records_path: default_records_path(),
            control_socket: default_control_socket(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Serial device path.
    #[must_use]
    pub fn serial_port(&self) -> &str {
        self.serial_port.as_str()
    }

    /// Serial line speed.
    #[must_use]
    pub const fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Board reset delay.
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Upper bound on one blocking read.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Enrollment confirmation window.
    #[must_use]
    pub const fn enroll_timeout(&self) -> Duration {
        Duration::from_millis(self.enroll_timeout_ms)
    }

    /// Search verdict window.
    #[must_use]
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Log retention bound.
    #[must_use]
    pub const fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Pending queue bound.
    #[must_use]
    pub const fn pending_capacity(&self) -> usize {
        self.pending_capacity
    }

    /// Location of the identity collection.
    #[must_use]
    pub fn records_path(&self) -> &Utf8PathBuf {
        &self.records_path
    }

    /// Control socket endpoint.
    #[must_use]
    pub fn control_socket(&self) -> &SocketEndpoint {
        &self.control_socket
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
