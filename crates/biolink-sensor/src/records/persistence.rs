//! Storage backends for the identity collection.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::{Identity, RecordError};

/// Loads and stores the full identity collection.
///
/// Implementations always rewrite the whole collection so a stored snapshot
/// is either the old one or the new one, never a mixture.
pub trait RecordPersistence: Send + Sync {
    /// Reads the stored collection; a missing store yields an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the store exists but cannot be read or
    /// decoded.
    fn load(&self) -> Result<Vec<Identity>, RecordError>;

    /// Replaces the stored collection with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the snapshot cannot be written.
    fn store(&self, records: &[Identity]) -> Result<(), RecordError>;
}

/// Keeps identities in a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    /// Persists to `path`, creating parent directories on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the JSON file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<Identity>, RecordError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(RecordError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&contents).map_err(|source| RecordError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, records: &[Identity]) -> Result<(), RecordError> {
        let payload = serde_json::to_vec_pretty(records).map_err(RecordError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecordError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        atomic_write(&self.path, &payload).map_err(|source| RecordError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Writes `contents` to a temporary sibling, syncs it, then renames it over
/// `path`.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("records"),
    );
    #[cfg(unix)]
    {
        builder.permissions(fs::Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use std::sync::{Arc, Mutex};

    use super::{Identity, RecordError, RecordPersistence};

    #[derive(Debug, Default)]
    struct MemoryState {
        records: Vec<Identity>,
        fail_stores: bool,
        stores: usize,
    }

    /// In-memory persistence with switchable write failures.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryPersistence {
        inner: Arc<Mutex<MemoryState>>,
    }

    impl MemoryPersistence {
        /// Creates an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a store pre-populated with `records`.
        #[must_use]
        pub fn with_records(records: Vec<Identity>) -> Self {
            let persistence = Self::default();
            persistence.state().records = records;
            persistence
        }

        /// Makes subsequent stores fail (or succeed again).
        pub fn fail_stores(&self, fail: bool) {
            self.state().fail_stores = fail;
        }

        /// Last successfully stored snapshot.
        #[must_use]
        pub fn snapshot(&self) -> Vec<Identity> {
            self.state().records.clone()
        }

        /// Number of successful stores.
        #[must_use]
        pub fn store_count(&self) -> usize {
            self.state().stores
        }

        fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
            self.inner
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
        }
    }

    impl RecordPersistence for MemoryPersistence {
        fn load(&self) -> Result<Vec<Identity>, RecordError> {
            Ok(self.state().records.clone())
        }

        fn store(&self, records: &[Identity]) -> Result<(), RecordError> {
            let mut state = self.state();
            if state.fail_stores {
                return Err(RecordError::Write {
                    path: "memory".into(),
                    source: std::io::Error::other("simulated store failure"),
                });
            }
            state.records = records.to_vec();
            state.stores = state.stores.saturating_add(1);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryPersistence;
