//! Enrolled identities and their persistent store.

mod persistence;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::protocol::FingerprintId;

#[cfg(any(test, feature = "test-support"))]
pub use persistence::MemoryPersistence;
pub use persistence::{JsonFilePersistence, RecordPersistence};

const RECORDS_TARGET: &str = "biolink_sensor::records";

/// A named fingerprint slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Sensor slot.
    pub id: FingerprintId,
    /// Display name.
    pub name: String,
    /// Whether the sensor acknowledged storing the template.
    #[serde(default = "confirmed_by_default")]
    pub confirmed: bool,
}

const fn confirmed_by_default() -> bool {
    true
}

impl Identity {
    /// Builds a confirmed identity.
    #[must_use]
    pub fn new(id: FingerprintId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            confirmed: true,
        }
    }

    /// Builds an identity still awaiting sensor confirmation.
    #[must_use]
    pub fn unconfirmed(id: FingerprintId, name: impl Into<String>) -> Self {
        Self {
            confirmed: false,
            ..Self::new(id, name)
        }
    }
}

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An identity with this id is already stored.
    #[error("ID {0} already exists")]
    Duplicate(FingerprintId),
    /// The stored collection lists the same id more than once.
    #[error("stored records list ID {0} more than once")]
    RepeatedId(FingerprintId),
    /// Reading the backing file failed.
    #[error("failed to read records from {}: {source}", .path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file held malformed JSON.
    #[error("failed to decode records in {}: {source}", .path.display())]
    Decode {
        /// File that could not be decoded.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Encoding the collection failed.
    #[error("failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),
    /// Writing the collection failed.
    #[error("failed to write records to {}: {source}", .path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Keyed collection of identities, written through on every change.
///
/// A mutation is applied to a copy, the copy is persisted, and only then does
/// it replace the in-memory collection. A failed write leaves both memory and
/// disk as they were.
pub struct RecordStore {
    records: Mutex<Vec<Identity>>,
    persistence: Box<dyn RecordPersistence>,
}

impl RecordStore {
    /// Loads the collection from `persistence`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the stored collection cannot be read, or
    /// [`RecordError::RepeatedId`] when it names an id twice.
    pub fn open(persistence: Box<dyn RecordPersistence>) -> Result<Self, RecordError> {
        let records = persistence.load()?;
        if let Some(id) = first_repeated_id(&records) {
            return Err(RecordError::RepeatedId(id));
        }
        debug!(
            target: RECORDS_TARGET,
            count = records.len(),
            "loaded identity records"
        );
        Ok(Self {
            records: Mutex::new(records),
            persistence,
        })
    }

    /// Adds `identity`, refusing ids that are already present.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Duplicate`] for a known id, or a persistence
    /// error when the write fails.
    pub fn add(&self, identity: Identity) -> Result<(), RecordError> {
        self.mutate(|records| {
            if records.iter().any(|record| record.id == identity.id) {
                return Err(RecordError::Duplicate(identity.id));
            }
            records.push(identity);
            Ok(true)
        })
        .map(|_| ())
    }

    /// Removes `id`; returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the write fails.
    pub fn remove(&self, id: FingerprintId) -> Result<bool, RecordError> {
        self.mutate(|records| {
            let before = records.len();
            records.retain(|record| record.id != id);
            Ok(records.len() != before)
        })
    }

    /// Renames `id`; returns whether a record was found.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the write fails.
    pub fn rename(&self, id: FingerprintId, name: &str) -> Result<bool, RecordError> {
        self.mutate(|records| {
            Ok(records
                .iter_mut()
                .find(|record| record.id == id)
                .map(|record| record.name = name.to_owned())
                .is_some())
        })
    }

    /// Marks `id` as confirmed by the sensor; returns whether it was found.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the write fails.
    pub fn confirm(&self, id: FingerprintId) -> Result<bool, RecordError> {
        self.mutate(|records| {
            match records
                .iter_mut()
                .find(|record| record.id == id && !record.confirmed)
            {
                Some(record) => {
                    record.confirmed = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// All identities in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Identity> {
        self.lock().clone()
    }

    /// Whether `id` is recorded.
    #[must_use]
    pub fn exists(&self, id: FingerprintId) -> bool {
        self.lock().iter().any(|record| record.id == id)
    }

    /// The identity stored under `id`.
    #[must_use]
    pub fn get(&self, id: FingerprintId) -> Option<Identity> {
        self.lock().iter().find(|record| record.id == id).cloned()
    }

    /// Applies `change` to a copy; persists and swaps it in when `change`
    /// reports a modification.
    fn mutate<F>(&self, change: F) -> Result<bool, RecordError>
    where
        F: FnOnce(&mut Vec<Identity>) -> Result<bool, RecordError>,
    {
        let mut guard = self.lock();
        let mut next = guard.clone();
        if !change(&mut next)? {
            return Ok(false);
        }
        self.persistence.store(&next)?;
        *guard = next;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Identity>> {
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn first_repeated_id(records: &[Identity]) -> Option<FingerprintId> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .map(|record| record.id)
        .find(|id| !seen.insert(*id))
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RecordStore")
            .field("records", &self.lock().len())
            .finish_non_exhaustive()
    }
}
