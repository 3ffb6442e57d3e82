// Static device identity, loaded once from config

use serde::Serialize;

/// One monitored device. Immutable after load; owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// SNMP community string. Never serialized back out over the API.
    #[serde(skip_serializing)]
    pub community: String,
}

impl DeviceDescriptor {
    /// `host:port`, the form used by the address index and the UDP socket.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
