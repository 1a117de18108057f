//! Daemon hosting a serial fingerprint sensor.
//!
//! `biolinkd` loads its configuration, opens the sensor's serial link, and
//! serves enroll, search and delete requests over a local control socket.
//! Each request line names an operation; the reply line carries the
//! outcome, a log excerpt or the enrolled identities.
//!
//! The daemon stays in the foreground and owns its control socket for the
//! whole run, so a second instance is refused before it touches the serial
//! port. It runs until a termination signal arrives or the sensor link
//! closes; a lost link ends the process with a failure status so a
//! supervisor can restart it once the device returns.

mod bootstrap;
mod dispatch;
mod health;
mod process;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Host, LinkProvider, SerialLinkProvider, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with, sensor_settings, serial_settings,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
