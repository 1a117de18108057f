//! Ways a daemon run can fail.

use std::io;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use biolink_config::SocketPreparationError;
use biolink_sensor::IngestError;

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Reasons a daemon run ended in failure.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The layered configuration could not be loaded.
    #[error("failed to load configuration: {0}")]
    Config(#[from] Arc<OrthoError>),
    /// The directory holding the control socket could not be prepared.
    #[error("failed to prepare control socket directory: {0}")]
    SocketDirectory(#[from] SocketPreparationError),
    /// The control socket could not be bound or served.
    #[error("control socket unavailable: {0}")]
    Listener(#[from] ListenerError),
    /// Records, link or ingest failed to start.
    #[error("sensor host failed to start: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// The thread waiting for stop requests could not be spawned.
    #[error("failed to watch for termination signals: {0}")]
    SignalWatcher(#[source] io::Error),
    /// Termination signals could not be received.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Ingest did not wind down cleanly.
    #[error("sensor ingest failed: {0}")]
    Ingest(#[from] IngestError),
    /// The sensor link closed while the daemon was serving.
    #[error("sensor link lost: {0}")]
    LinkClosed(String),
}

impl LaunchError {
    /// Whether another daemon is already serving the control socket.
    #[must_use]
    pub fn is_already_running(&self) -> bool {
        #[cfg(unix)]
        {
            matches!(self, Self::Listener(ListenerError::AlreadyServed { .. }))
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}
