//! Assembles and runs the sensor host until a stop is requested.

use std::sync::Arc;

use tracing::{error, info};

use crate::bootstrap::{
    ConfigLoader, LinkProvider, SerialLinkProvider, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
use crate::dispatch::DispatchConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::stop::{StopChannel, StopReason};

/// Collaborators a daemon run is assembled from.
pub(crate) struct Supervisor<L, P, S> {
    pub(crate) loader: L,
    pub(crate) link: P,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the daemon in the foreground with the production collaborators.
///
/// Returns once a termination signal has been handled. A sensor link that
/// closes while the daemon is serving ends the run with
/// [`LaunchError::LinkClosed`].
///
/// # Errors
///
/// Returns [`LaunchError`] when startup fails, when another daemon already
/// serves the control socket, or when the link is lost.
pub fn run_daemon() -> Result<(), LaunchError> {
    Supervisor {
        loader: SystemConfigLoader,
        link: SerialLinkProvider,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal,
    }
    .run()
}

impl<L, P, S> Supervisor<L, P, S>
where
    L: ConfigLoader,
    P: LinkProvider,
    S: ShutdownSignal + 'static,
{
    pub(crate) fn run(self) -> Result<(), LaunchError> {
        let Self {
            loader,
            link,
            reporter,
            shutdown,
        } = self;

        let config = loader.load()?;
        config.control_socket().prepare_filesystem()?;
        // Claiming the socket first keeps a second daemon off the serial port.
        let listener = SocketListener::bind(config.control_socket())?;

        let stop = StopChannel::new();
        let host = bootstrap_with(
            &StaticConfigLoader::new(config),
            reporter,
            &link,
            stop.link_notifier(),
        )?;
        let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(host.service())));
        let serving = listener.start(handler)?;
        info!(target: PROCESS_TARGET, "sensor host serving control requests");

        stop.watch(shutdown).map_err(LaunchError::SignalWatcher)?;
        let reason = stop.wait();

        serving.stop()?;
        let exit = host.service().shutdown()?;
        info!(target: PROCESS_TARGET, ?exit, "sensor host stopped");
        conclude(reason)
    }
}

fn conclude(reason: StopReason) -> Result<(), LaunchError> {
    match reason {
        StopReason::Signal => Ok(()),
        StopReason::SignalFailed(source) => Err(source.into()),
        StopReason::LinkClosed(message) => {
            error!(
                target: PROCESS_TARGET,
                reason = %message,
                "stopping because the sensor link closed"
            );
            Err(LaunchError::LinkClosed(message))
        }
    }
}
