//! Collaborator doubles shared by the daemon behaviour suites.

mod config_loader;
mod link_provider;
mod reporter;

pub(crate) use config_loader::{FailingConfigLoader, TestConfigLoader};
pub(crate) use link_provider::ScriptedLinkProvider;
pub(crate) use reporter::{HealthEvent, RecordingHealthReporter};
