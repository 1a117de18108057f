//! Funnels every condition that ends a daemon run into one channel.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::debug;

use biolink_sensor::{ExitNotifier, IngestExit};

use super::PROCESS_TARGET;
use super::shutdown::{ShutdownError, ShutdownSignal};

/// Why the daemon is stopping.
#[derive(Debug)]
pub(crate) enum StopReason {
    /// A termination signal arrived.
    Signal,
    /// Installing the signal listener failed.
    SignalFailed(ShutdownError),
    /// The sensor link closed and ingest ended.
    LinkClosed(String),
}

/// Collects stop reasons from the signal watcher and the ingest loop.
#[derive(Debug)]
pub(crate) struct StopChannel {
    sender: Sender<StopReason>,
    receiver: Receiver<StopReason>,
}

impl StopChannel {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Notifier for the ingest loop; only a failed exit stops the daemon.
    pub(crate) fn link_notifier(&self) -> ExitNotifier {
        let sender = self.sender.clone();
        Box::new(move |exit| {
            if let IngestExit::Failed(error) = exit {
                deliver(&sender, StopReason::LinkClosed(error.to_string()));
            }
        })
    }

    /// Waits on `signal` from a detached thread.
    pub(crate) fn watch<S>(&self, signal: S) -> io::Result<()>
    where
        S: ShutdownSignal + 'static,
    {
        let sender = self.sender.clone();
        thread::Builder::new()
            .name("biolinkd-signals".to_owned())
            .spawn(move || {
                let reason = match signal.wait() {
                    Ok(()) => StopReason::Signal,
                    Err(error) => StopReason::SignalFailed(error),
                };
                deliver(&sender, reason);
            })
            .map(|_| ())
    }

    /// Blocks until the first stop reason arrives.
    ///
    /// The channel keeps its own sender, so this only returns once a
    /// watcher or notifier has reported.
    pub(crate) fn wait(&self) -> StopReason {
        match self.receiver.recv() {
            Ok(reason) => reason,
            Err(_) => StopReason::Signal,
        }
    }
}

fn deliver(sender: &Sender<StopReason>, reason: StopReason) {
    if sender.send(reason).is_err() {
        debug!(
            target: PROCESS_TARGET,
            "stop reason arrived after shutdown completed"
        );
    }
}
