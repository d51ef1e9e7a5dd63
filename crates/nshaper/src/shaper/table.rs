//! Devices known to the transport, keyed by interface index.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::device::Device;
use super::sim::{SimBackend, SimConfig};
use crate::{Error, Result};

/// Registry of devices.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: RwLock<BTreeMap<u32, Arc<Device>>>,
}

impl DeviceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Fails if its ifindex or name is taken.
    pub fn register(&self, dev: Device) -> Result<Arc<Device>> {
        let mut devices = self.devices.write();
        if devices.contains_key(&dev.ifindex()) {
            return Err(Error::InvalidRequest(format!(
                "ifindex {} already registered",
                dev.ifindex()
            )));
        }
        if devices.values().any(|d| d.name() == dev.name()) {
            return Err(Error::InvalidRequest(format!(
                "device {} already registered",
                dev.name()
            )));
        }

        let dev = Arc::new(dev);
        devices.insert(dev.ifindex(), dev.clone());
        tracing::debug!(dev = dev.name(), ifindex = dev.ifindex(), "device registered");
        Ok(dev)
    }

    /// Register a simulated device built from `config`.
    pub fn register_sim(&self, config: SimConfig) -> Result<(Arc<Device>, Arc<SimBackend>)> {
        config.validate()?;
        let sim = Arc::new(SimBackend::new(config.clone()));
        let dev = Device::new(config.ifindex, config.name.clone())
            .with_backend(sim.clone())
            .with_limits(config.limits());
        Ok((self.register(dev)?, sim))
    }

    /// Remove a device and tear its shaper store down.
    pub fn unregister(&self, ifindex: u32) -> Option<Arc<Device>> {
        let dev = self.devices.write().remove(&ifindex)?;
        dev.teardown();
        tracing::debug!(dev = dev.name(), ifindex, "device unregistered");
        Some(dev)
    }

    /// Device by ifindex.
    pub fn get(&self, ifindex: u32) -> Result<Arc<Device>> {
        self.devices
            .read()
            .get(&ifindex)
            .cloned()
            .ok_or(Error::DeviceNotFound { ifindex })
    }

    /// Device by ifindex, failing with `Unsupported` if it has no
    /// shaper backend.
    pub fn get_shaper_device(&self, ifindex: u32) -> Result<Arc<Device>> {
        let dev = self.get(ifindex)?;
        dev.backend()?;
        Ok(dev)
    }

    /// Device by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Device>> {
        self.devices
            .read()
            .values()
            .find(|d| d.name() == name)
            .cloned()
    }

    /// All devices, in ifindex order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().values().cloned().collect()
    }
}
