//! Termination signal handling.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Signals that end a daemon run.
const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Something the daemon can block on until it should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until a stop has been requested.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failure to listen for a stop request.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The signal handlers could not be registered.
    #[error("failed to register termination signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Blocks on the process termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal = signal_name(signal).unwrap_or("unknown"),
                "termination signal received; stopping"
            );
        }
        Ok(())
    }
}
