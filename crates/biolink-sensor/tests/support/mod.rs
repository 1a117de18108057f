//! Shared fixtures for sensor integration tests.

use std::time::{Duration, Instant};

use biolink_sensor::testing::ScriptedLink;
use biolink_sensor::{
    JsonFilePersistence, RecordStore, SensorService, SensorSettings, Timeouts,
};
use tempfile::TempDir;

/// Enroll and search windows used throughout the integration suite.
pub const WINDOW: Duration = Duration::from_millis(300);

/// A running service over a scripted link and a temporary records file.
pub struct Rig {
    pub link: ScriptedLink,
    pub service: SensorService,
    pub dir: TempDir,
}

impl Rig {
    pub fn start() -> Self {
        Self::with_log_capacity(50)
    }

    pub fn with_log_capacity(log_capacity: usize) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let link = ScriptedLink::new();
        let records = RecordStore::open(Box::new(JsonFilePersistence::new(
            dir.path().join("records.json"),
        )))
        .expect("open records");
        let settings = SensorSettings {
            log_capacity,
            pending_capacity: 64,
            read_timeout: Duration::from_millis(10),
            timeouts: Timeouts {
                enroll: WINDOW,
                search: WINDOW,
            },
        };
        let service = SensorService::start(link.source(), records, &settings, Box::new(|_| {}))
            .expect("start service");
        Self { link, service, dir }
    }

    pub fn records_json(&self) -> serde_json::Value {
        let bytes = std::fs::read(self.dir.path().join("records.json")).expect("records file");
        serde_json::from_slice(&bytes).expect("records json")
    }

    /// Waits until the log holds a line containing `needle`.
    pub fn wait_for_log(&self, needle: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self
                .service
                .get_log(usize::MAX)
                .iter()
                .any(|entry| entry.text.contains(needle))
            {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        let _stopped = self.service.shutdown();
    }
}
