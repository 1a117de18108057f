//! Health reporter that records lifecycle events for assertions.

use std::sync::Mutex;

use biolink_config::Config;
use biolink_sensor::{IngestExit, LinkError};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Lifecycle events observed during a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    LinkOpening,
    LinkReady,
    LinkFailed,
    IngestStopped,
    IngestFailed,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn link_opening(&self, _port: &str) {
        self.record(HealthEvent::LinkOpening);
    }

    fn link_ready(&self, _port: &str) {
        self.record(HealthEvent::LinkReady);
    }

    fn link_failed(&self, _port: &str, _error: &LinkError) {
        self.record(HealthEvent::LinkFailed);
    }

    fn ingest_stopped(&self, exit: &IngestExit) {
        self.record(match exit {
            IngestExit::Stopped => HealthEvent::IngestStopped,
            IngestExit::Failed(_) => HealthEvent::IngestFailed,
        });
    }
}
