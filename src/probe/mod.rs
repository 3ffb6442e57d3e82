// Device probe contract. The scheduler only depends on this trait; the SNMP
// adapter is the implementation the binary wires in.

pub mod snmp;

use std::future::Future;
use std::time::Duration;

use crate::models::{DeviceDescriptor, DeviceMetrics};

pub use snmp::SnmpProbe;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("agent error: {0}")]
    Agent(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<snmp::ber::BerError> for ProbeError {
    fn from(e: snmp::ber::BerError) -> Self {
        ProbeError::Malformed(e.to_string())
    }
}

/// Fetches metrics from one device.
///
/// Implementations must give up by `timeout` and report every problem as `Err`
/// (never panic). They are invoked concurrently for different devices.
pub trait Probe: Send + Sync + 'static {
    fn probe(
        &self,
        device: &DeviceDescriptor,
        timeout: Duration,
    ) -> impl Future<Output = Result<DeviceMetrics, ProbeError>> + Send;
}
