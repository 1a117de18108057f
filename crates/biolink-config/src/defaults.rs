//! Default values shared by the configuration loader and its tests.

use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use dirs::{data_dir, runtime_dir};
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Serial device used when none is configured.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// Line speed expected by the sensor firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Time allowed for the board to finish its reset after the port opens.
pub const DEFAULT_SETTLE_MS: u64 = 2_000;

/// Upper bound on a single blocking line read inside the ingest loop.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 250;

/// Window in which an enrollment confirmation must arrive.
pub const DEFAULT_ENROLL_TIMEOUT_MS: u64 = 5_000;

/// Window in which a search verdict must arrive.
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 3_000;

/// Number of log lines retained for observers.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Number of unclaimed lines kept for response correlation.
pub const DEFAULT_PENDING_CAPACITY: usize = 256;

/// TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned serial port default for serde.
#[must_use]
pub fn default_serial_port() -> String {
    DEFAULT_SERIAL_PORT.to_owned()
}

/// Baud rate default for serde.
#[must_use]
pub const fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Settle delay default for serde.
#[must_use]
pub const fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

/// Read timeout default for serde.
#[must_use]
pub const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Enrollment timeout default for serde.
#[must_use]
pub const fn default_enroll_timeout_ms() -> u64 {
    DEFAULT_ENROLL_TIMEOUT_MS
}

/// Search timeout default for serde.
#[must_use]
pub const fn default_search_timeout_ms() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_MS
}

/// Log capacity default for serde.
#[must_use]
pub const fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

/// Pending queue capacity default for serde.
#[must_use]
pub const fn default_pending_capacity() -> usize {
    DEFAULT_PENDING_CAPACITY
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Location of the enrolled identity collection.
///
/// Uses the platform data directory when one exists, otherwise the working
/// directory.
#[must_use]
pub fn default_records_path() -> Utf8PathBuf {
    let mut base = data_base_directory().unwrap_or_else(|| Utf8PathBuf::from("."));
    base.push("biolink");
    base.push("records.json");
    base
}

#[cfg(unix)]
fn data_base_directory() -> Option<Utf8PathBuf> {
    data_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn data_base_directory() -> Option<Utf8PathBuf> {
    None
}

/// Computes the default control socket for the daemon.
#[must_use]
pub fn default_control_socket() -> SocketEndpoint {
    default_control_socket_inner()
}

#[cfg(unix)]
fn default_control_socket_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("biolink");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("biolinkd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
pub(crate) fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_control_socket_inner() -> SocketEndpoint {
    let _ = env::temp_dir();
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
