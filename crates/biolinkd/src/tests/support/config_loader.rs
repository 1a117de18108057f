//! Configuration loaders for success and failure scenarios.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use biolink_config::{Config, LogFormat, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Places the control socket and the records file in a private temporary
/// directory.
#[derive(Clone)]
pub(crate) struct TestConfigLoader {
    dir: Arc<TempDir>,
}

impl TestConfigLoader {
    pub(crate) fn new() -> Self {
        Self {
            dir: Arc::new(TempDir::new().expect("temporary runtime directory")),
        }
    }

    pub(crate) fn runtime_dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn records_path(&self) -> PathBuf {
        self.dir.path().join("records.json")
    }

    fn utf8(path: &Path) -> String {
        path.to_str()
            .expect("temporary path was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            serial_port: "/dev/scripted".to_owned(),
            settle_ms: 0,
            read_timeout_ms: 10,
            enroll_timeout_ms: 300,
            search_timeout_ms: 300,
            records_path: Self::utf8(&self.records_path()).into(),
            control_socket: SocketEndpoint::unix(Self::utf8(
                &self.runtime_dir().join("biolinkd.sock"),
            )),
            log_format: LogFormat::Compact,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unparsable line speed.
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("biolinkd"),
            OsString::from("--baud-rate"),
            OsString::from("fast"),
        ];
        Config::load_from_iter(args)
    }
}
