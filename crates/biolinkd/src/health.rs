//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use biolink_config::Config;
use biolink_sensor::{IngestExit, LinkError};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = "biolinkd::health";

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the serial device is opened.
    fn link_opening(&self, port: &str);

    /// Invoked once the serial device is open and purged.
    fn link_ready(&self, port: &str);

    /// Invoked when the serial device cannot be opened.
    fn link_failed(&self, port: &str, error: &LinkError);

    /// Invoked on the ingest thread when the ingest loop ends.
    fn ingest_stopped(&self, exit: &IngestExit);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn link_opening(&self, port: &str) {
        (**self).link_opening(port);
    }

    fn link_ready(&self, port: &str) {
        (**self).link_ready(port);
    }

    fn link_failed(&self, port: &str, error: &LinkError) {
        (**self).link_failed(port, error);
    }

    fn ingest_stopped(&self, exit: &IngestExit) {
        (**self).ingest_stopped(exit);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.control_socket(),
            serial_port = config.serial_port(),
            records = %config.records_path(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn link_opening(&self, port: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "link_opening",
            port,
            "opening sensor link"
        );
    }

    fn link_ready(&self, port: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "link_ready",
            port,
            "sensor link ready"
        );
    }

    fn link_failed(&self, port: &str, error: &LinkError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "link_failed",
            port,
            error = %error,
            "sensor link failed to open"
        );
    }

    fn ingest_stopped(&self, exit: &IngestExit) {
        match exit {
            IngestExit::Stopped => tracing::info!(
                target: HEALTH_TARGET,
                event = "ingest_stopped",
                "sensor ingest stopped"
            ),
            IngestExit::Failed(error) => tracing::error!(
                target: HEALTH_TARGET,
                event = "ingest_failed",
                error = %error,
                "sensor ingest ended with a fatal link error"
            ),
        }
    }
}
