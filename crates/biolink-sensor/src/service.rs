//! Caller-facing operations over a running sensor link.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use crate::dispatcher::{CommandDispatcher, SensorError, Timeouts};
use crate::ingest::{ExitNotifier, IngestError, IngestExit, IngestHandle, IngestLoop};
use crate::journal::Journal;
use crate::line::LogEntry;
use crate::link::LineSource;
use crate::outcome::OperationReply;
use crate::protocol::{FingerprintId, Verb};
use crate::records::{Identity, RecordError, RecordStore};

const SERVICE_TARGET: &str = "biolink_sensor::service";

/// Tunables for a [`SensorService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    /// Number of log lines retained.
    pub log_capacity: usize,
    /// Number of unclaimed lines retained for correlation.
    pub pending_capacity: usize,
    /// Upper bound on one blocking read in the ingest loop.
    pub read_timeout: Duration,
    /// Response windows.
    pub timeouts: Timeouts,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            log_capacity: 50,
            pending_capacity: 256,
            read_timeout: Duration::from_millis(250),
            timeouts: Timeouts::default(),
        }
    }
}

/// The sensor host: ingest loop, dispatcher, log, and records.
pub struct SensorService {
    journal: Arc<Journal>,
    records: Arc<RecordStore>,
    dispatcher: CommandDispatcher,
    ingest: Mutex<Option<IngestHandle>>,
}

impl SensorService {
    /// Splits `source`, starts ingesting, and readies the dispatcher.
    ///
    /// `on_exit` runs on the ingest thread when the loop ends, which is how a
    /// fatal link closure reaches the process owner.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Spawn`] if the ingest thread cannot start.
    pub fn start(
        source: LineSource,
        records: RecordStore,
        settings: &SensorSettings,
        on_exit: ExitNotifier,
    ) -> Result<Self, IngestError> {
        let (reader, writer) = source.split();
        let journal = Arc::new(Journal::new(
            settings.log_capacity,
            settings.pending_capacity,
        ));
        let records = Arc::new(records);
        let ingest = IngestLoop::new(reader, Arc::clone(&journal), settings.read_timeout)
            .start(on_exit)?;
        let dispatcher = CommandDispatcher::new(
            writer,
            Arc::clone(&journal),
            Arc::clone(&records),
            settings.timeouts,
        );
        info!(
            target: SERVICE_TARGET,
            records = records.list().len(),
            "sensor service started"
        );
        Ok(Self {
            journal,
            records,
            dispatcher,
            ingest: Mutex::new(Some(ingest)),
        })
    }

    /// Runs a sensor command and summarises its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] when the link or the record store fails.
    pub fn invoke(
        &self,
        verb: Verb,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<OperationReply, SensorError> {
        self.dispatcher
            .invoke(verb, id, name)
            .map(|outcome| outcome.reply())
    }

    /// The newest `limit` log entries, oldest first.
    #[must_use]
    pub fn get_log(&self, limit: usize) -> Vec<LogEntry> {
        self.journal
            .snapshot(limit)
            .iter()
            .map(crate::line::Line::entry)
            .collect()
    }

    /// Empties the log without touching pending lines.
    pub fn clear_log(&self) {
        self.journal.clear_log();
    }

    /// All enrolled identities.
    #[must_use]
    pub fn list_records(&self) -> Vec<Identity> {
        self.records.list()
    }

    /// Renames the record stored under `id`.
    ///
    /// Returns `false` for an invalid or unknown id or a blank name.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the change cannot be persisted.
    pub fn rename_record(&self, id: &str, name: &str) -> Result<bool, RecordError> {
        let trimmed = name.trim();
        match id.parse::<FingerprintId>() {
            Ok(parsed) if !trimmed.is_empty() => self.records.rename(parsed, trimmed),
            _ => Ok(false),
        }
    }

    /// Forgets the record stored under `id` without contacting the sensor.
    ///
    /// Returns `false` for an invalid or unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the change cannot be persisted.
    pub fn delete_record(&self, id: &str) -> Result<bool, RecordError> {
        match id.parse::<FingerprintId>() {
            Ok(parsed) => self.records.remove(parsed),
            Err(_) => Ok(false),
        }
    }

    /// Shared log and pending queue.
    #[must_use]
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    /// Stops the ingest loop and waits for it.
    ///
    /// Returns `None` when the service was already shut down.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::ThreadPanic`] if the ingest thread panicked.
    pub fn shutdown(&self) -> Result<Option<IngestExit>, IngestError> {
        let handle = self
            .ingest
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        match handle {
            Some(handle) => {
                handle.shutdown();
                handle.join().map(Some)
            }
            None => Ok(None),
        }
    }
}

impl Drop for SensorService {
    fn drop(&mut self) {
        if let Some(handle) = self
            .ingest
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .as_ref()
        {
            handle.shutdown();
        }
    }
}

impl std::fmt::Debug for SensorService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SensorService")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
