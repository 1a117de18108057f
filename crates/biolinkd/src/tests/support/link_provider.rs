//! Link provider backed by the scripted sensor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use biolink_config::Config;
use biolink_sensor::testing::ScriptedLink;
use biolink_sensor::{LineSource, LinkError};

use crate::bootstrap::LinkProvider;

/// Hands out the scripted link, or refuses to when the device is "unplugged".
#[derive(Clone, Default)]
pub(crate) struct ScriptedLinkProvider {
    pub(crate) link: ScriptedLink,
    unplugged: bool,
    opens: Arc<AtomicUsize>,
}

impl ScriptedLinkProvider {
    pub(crate) fn unplugged() -> Self {
        Self {
            unplugged: true,
            ..Self::default()
        }
    }

    /// Number of times a host asked for the device.
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl LinkProvider for ScriptedLinkProvider {
    fn open(&self, config: &Config) -> Result<LineSource, LinkError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.unplugged {
            return Err(LinkError::closed(format!(
                "{} is not present",
                config.serial_port()
            )));
        }
        Ok(self.link.source())
    }
}
