//! Background loop that drains the link into the journal.

use std::io;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::journal::Journal;
use crate::line::Line;
use crate::link::{LineReader, LinkError};

const INGEST_TARGET: &str = "biolink_sensor::ingest";
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Errors ending the ingest loop.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The link closed permanently.
    #[error("serial link closed: {0}")]
    ChannelClosed(#[source] LinkError),
    /// The ingest thread could not be started.
    #[error("failed to spawn ingest thread: {0}")]
    Spawn(#[source] io::Error),
    /// The ingest thread panicked.
    #[error("ingest thread panicked")]
    ThreadPanic,
}

/// How the ingest loop ended.
#[derive(Debug)]
pub enum IngestExit {
    /// Shutdown was requested.
    Stopped,
    /// The link failed; the process owner should shut down.
    Failed(IngestError),
}

/// Callback invoked on the ingest thread once the loop ends.
pub type ExitNotifier = Box<dyn FnOnce(&IngestExit) + Send>;

/// Single consumer of the link's reader half.
pub struct IngestLoop {
    reader: Box<dyn LineReader>,
    journal: Arc<Journal>,
    read_timeout: Duration,
}

impl IngestLoop {
    /// Prepares a loop publishing into `journal`.
    ///
    /// The loop polls the link for pending input and only reads when some is
    /// waiting. `read_timeout` bounds each read and each idle pause, and
    /// therefore how quickly a shutdown request is noticed.
    #[must_use]
    pub fn new(reader: Box<dyn LineReader>, journal: Arc<Journal>, read_timeout: Duration) -> Self {
        Self {
            reader,
            journal,
            read_timeout,
        }
    }

    /// Starts the loop on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Spawn`] when the thread cannot be created.
    pub fn start(self, on_exit: ExitNotifier) -> Result<IngestHandle, IngestError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("biolink-ingest".to_owned())
            .spawn(move || {
                let exit = self.run(&shutdown_flag);
                on_exit(&exit);
                exit
            })
            .map_err(IngestError::Spawn)?;
        Ok(IngestHandle {
            shutdown,
            handle: Some(handle),
        })
    }

    fn run(mut self, shutdown: &AtomicBool) -> IngestExit {
        info!(target: INGEST_TARGET, "serial ingest active");
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.poll() {
                Ok(Some(raw)) => {
                    last_error = None;
                    self.accept(&raw);
                }
                Ok(None) => {}
                Err(error) if error.is_fatal() => {
                    warn!(
                        target: INGEST_TARGET,
                        error = %error,
                        "serial link closed, stopping ingest"
                    );
                    return IngestExit::Failed(IngestError::ChannelClosed(error));
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: INGEST_TARGET,
                            error = %error,
                            "serial read error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        debug!(target: INGEST_TARGET, "serial ingest stopped");
        IngestExit::Stopped
    }

    fn poll(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        if self.reader.has_input()? {
            self.reader.read_line(self.read_timeout)
        } else {
            thread::sleep(self.read_timeout);
            Ok(None)
        }
    }

    fn accept(&self, raw: &[u8]) {
        if let Some(line) = Line::decode(raw) {
            trace!(target: INGEST_TARGET, line = line.text(), "received line");
            self.journal.publish(line);
        }
    }
}

impl std::fmt::Debug for IngestLoop {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("IngestLoop")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

/// Handle to the running ingest thread.
#[derive(Debug)]
pub struct IngestHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<IngestExit>>,
}

impl IngestHandle {
    /// Asks the loop to stop after its current read.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the loop to end.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::ThreadPanic`] if the thread panicked.
    pub fn join(mut self) -> Result<IngestExit, IngestError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| IngestError::ThreadPanic),
            None => Ok(IngestExit::Stopped),
        }
    }
}

impl Drop for IngestHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
