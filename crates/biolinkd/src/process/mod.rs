//! Foreground supervision of the sensor host.
//!
//! A run owns the control socket for its whole life, so a second daemon
//! pointed at the same socket is refused before it opens the serial port.
//! The run ends on a termination signal or when the sensor link closes.

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;
mod stop;

pub use errors::LaunchError;
pub use launch::run_daemon;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
