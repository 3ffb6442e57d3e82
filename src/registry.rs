// Static device registry with name and address index views.
// Built once at startup; read-only afterwards, so it needs no locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::config::DeviceConfig;
use crate::models::DeviceDescriptor;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate device name {0:?}")]
    DuplicateName(String),
    #[error("device #{0} has an empty name")]
    EmptyName(usize),
    #[error("device {0:?} has an empty host")]
    EmptyHost(String),
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
    by_name: HashMap<String, usize>,
    /// Keys are both "host:port" and bare "host"; the first device in registry order owns a shared key.
    by_address: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Builds the registry from config entries, preserving their order.
    pub fn load(entries: &[DeviceConfig]) -> Result<Self, RegistryError> {
        let devices = entries
            .iter()
            .map(|d| DeviceDescriptor {
                name: d.name.clone(),
                host: d.host.clone(),
                port: d.port,
                community: d.community.clone(),
            })
            .collect();
        Self::from_descriptors(devices)
    }

    pub fn from_descriptors(devices: Vec<DeviceDescriptor>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(devices.len());
        let mut by_address = HashMap::with_capacity(devices.len() * 2);

        for (idx, device) in devices.iter().enumerate() {
            if device.name.trim().is_empty() {
                return Err(RegistryError::EmptyName(idx));
            }
            if device.host.trim().is_empty() {
                return Err(RegistryError::EmptyHost(device.name.clone()));
            }
            match by_name.entry(device.name.clone()) {
                Entry::Occupied(_) => return Err(RegistryError::DuplicateName(device.name.clone())),
                Entry::Vacant(v) => {
                    v.insert(idx);
                }
            }
            by_address.entry(device.address()).or_insert(idx);
            by_address.entry(device.host.clone()).or_insert(idx);
        }

        Ok(Self {
            devices,
            by_name,
            by_address,
        })
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.by_name.get(name).map(|&i| &self.devices[i])
    }

    pub fn by_address(&self, address: &str) -> Option<&DeviceDescriptor> {
        self.by_address.get(address).map(|&i| &self.devices[i])
    }

    /// Resolves an API key to a device. A name match always wins over an address match,
    /// so a device named "10.0.0.5" shadows whichever device has that address.
    pub fn lookup(&self, key: &str) -> Option<&DeviceDescriptor> {
        self.by_name(key).or_else(|| self.by_address(key))
    }

    /// Position of the device in registry (config) order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
