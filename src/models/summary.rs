// Dashboard aggregates derived from the store on read

use serde::Serialize;

use super::DeviceStatus;

/// Counts and averages over all registered devices.
/// Averages are None when no online device contributed a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub online_pct: f64,
    pub offline_pct: f64,
    pub avg_cpu: Option<f64>,
    pub avg_memory: Option<f64>,
    pub avg_interface_availability: Option<f64>,
}

/// Pushed to /ws/status after every completed poll cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycle: u64,
    pub completed_at: u64,
    pub summary: AggregateSnapshot,
    pub devices: Vec<DeviceStatus>,
}
