//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use biolink_config::{Config, SocketPreparationError};
use biolink_sensor::{
    ExitNotifier, IngestError, JsonFilePersistence, LineSource, LinkError, RecordError,
    RecordStore, SensorService, SensorSettings, SerialSettings, Timeouts, open_serial,
};

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration that has already been resolved.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Opens the line-oriented channel to the sensor.
pub trait LinkProvider: Send + Sync {
    /// Opens the link described by `config`.
    fn open(&self, config: &Config) -> Result<LineSource, LinkError>;
}

/// Provider that opens the configured serial device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialLinkProvider;

impl LinkProvider for SerialLinkProvider {
    fn open(&self, config: &Config) -> Result<LineSource, LinkError> {
        open_serial(&serial_settings(config))
    }
}

/// Serial parameters taken from `config`.
#[must_use]
pub fn serial_settings(config: &Config) -> SerialSettings {
    SerialSettings {
        port: config.serial_port().to_owned(),
        baud_rate: config.baud_rate(),
        settle: config.settle(),
        read_timeout: config.read_timeout(),
    }
}

/// Sensor service tunables taken from `config`.
#[must_use]
pub const fn sensor_settings(config: &Config) -> SensorSettings {
    SensorSettings {
        log_capacity: config.log_capacity(),
        pending_capacity: config.pending_capacity(),
        read_timeout: config.read_timeout(),
        timeouts: Timeouts {
            enroll: config.enroll_timeout(),
            search: config.search_timeout(),
        },
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare control socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The identity records could not be loaded.
    #[error("failed to load identity records: {source}")]
    Records {
        /// Underlying persistence error.
        #[source]
        source: RecordError,
    },
    /// The sensor link could not be opened.
    #[error("failed to open sensor link on {port}: {source}")]
    Link {
        /// Configured device.
        port: String,
        /// Underlying link error.
        #[source]
        source: LinkError,
    },
    /// The ingest loop could not be started.
    #[error("failed to start sensor ingest: {source}")]
    Ingest {
        /// Underlying ingest error.
        #[source]
        source: IngestError,
    },
}

/// A bootstrapped sensor host.
#[derive(Debug)]
pub struct Host {
    config: Config,
    service: Arc<SensorService>,
    telemetry: TelemetryHandle,
}

impl Host {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The running sensor service.
    #[must_use]
    pub const fn service(&self) -> &Arc<SensorService> {
        &self.service
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the sensor host using the supplied collaborators.
///
/// `on_exit` is called on the ingest thread once the ingest loop ends, after
/// the reporter has seen the exit.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    provider: &dyn LinkProvider,
    on_exit: ExitNotifier,
) -> Result<Host, BootstrapError> {
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    reporter.bootstrap_starting();

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;

    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;

    config
        .control_socket()
        .prepare_filesystem()
        .map_err(|source| fail(BootstrapError::Socket { source }))?;

    let persistence = JsonFilePersistence::new(config.records_path().as_std_path().to_path_buf());
    let records = RecordStore::open(Box::new(persistence))
        .map_err(|source| fail(BootstrapError::Records { source }))?;

    let port = config.serial_port();
    reporter.link_opening(port);
    let link = match provider.open(&config) {
        Ok(link) => link,
        Err(error) => {
            reporter.link_failed(port, &error);
            return Err(fail(BootstrapError::Link {
                port: port.to_owned(),
                source: error,
            }));
        }
    };
    reporter.link_ready(port);

    let ingest_reporter = Arc::clone(&reporter);
    let notifier: ExitNotifier = Box::new(move |exit| {
        ingest_reporter.ingest_stopped(exit);
        on_exit(exit);
    });
    let service = SensorService::start(link, records, &sensor_settings(&config), notifier)
        .map_err(|ingest| fail(BootstrapError::Ingest { source: ingest }))?;

    reporter.bootstrap_succeeded(&config);
    Ok(Host {
        config,
        service: Arc::new(service),
        telemetry,
    })
}
