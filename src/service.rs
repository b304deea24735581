//! Discovery of the devices registered by every interface version.

use std::collections::HashSet;

use log::{debug, error};

use crate::error::Result;
use crate::execution::SharedDevice;
use crate::model::Version;

/// Devices registered under one interface version
pub trait DeviceProvider: Send + Sync {
    fn version(&self) -> Version;

    fn instance_names(&self) -> Vec<String>;

    fn get_device(&self, name: &str) -> Result<SharedDevice>;
}

/// Collect the devices of all providers, newest interface version first.
///
/// An instance name registered by several versions yields only the device of
/// the newest one that could be created. Failures are logged and skipped.
///
/// A name is only claimed once its device exists, so when the newest
/// registration fails an older registration of the same name is used
/// instead of the name disappearing.
pub fn get_devices(providers: &[Box<dyn DeviceProvider>]) -> Vec<SharedDevice> {
    let mut ordered: Vec<&dyn DeviceProvider> = providers.iter().map(|provider| provider.as_ref()).collect();
    ordered.sort_by(|a, b| b.version().cmp(&a.version()));

    let mut seen = HashSet::new();
    let mut devices = Vec::new();
    for provider in ordered {
        for name in provider.instance_names() {
            if seen.contains(&name) {
                debug!("{} is already provided by a newer interface; skipping {}", name, provider.version());
                continue;
            }
            match provider.get_device(&name) {
                Ok(device) => {
                    seen.insert(name);
                    devices.push(device);
                }
                Err(e) => error!("failed to create device {} ({}): {}", name, provider.version(), e),
            }
        }
    }
    devices
}
