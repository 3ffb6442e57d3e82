// Per-device poll results as stored in the metrics cache

use serde::{Deserialize, Serialize};

/// Readings from one successful probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    pub sys_name: Option<String>,
    pub uptime_secs: u64,
    /// Mean processor load across all CPUs, percent. None when the device has no processor table.
    pub cpu_load: Option<f64>,
    pub memory_used_pct: Option<f64>,
    pub interfaces_up: u32,
    pub interfaces_total: u32,
}

impl DeviceMetrics {
    /// Share of interfaces that are up, percent. None when the device reports no interfaces.
    pub fn interface_availability(&self) -> Option<f64> {
        if self.interfaces_total == 0 {
            None
        } else {
            Some(self.interfaces_up as f64 / self.interfaces_total as f64 * 100.0)
        }
    }
}

/// Outcome of one probe; serializes with a lowercase `status` tag ("online" / "offline").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum PollOutcome {
    #[serde(rename = "online")]
    Success(DeviceMetrics),
    #[serde(rename = "offline")]
    Failure { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub device_name: String,
    /// Start of the poll attempt, ms since the Unix epoch.
    pub observed_at: u64,
    #[serde(flatten)]
    pub outcome: PollOutcome,
}

impl PollResult {
    pub fn success(device_name: impl Into<String>, observed_at: u64, metrics: DeviceMetrics) -> Self {
        Self {
            device_name: device_name.into(),
            observed_at,
            outcome: PollOutcome::Success(metrics),
        }
    }

    pub fn failure(
        device_name: impl Into<String>,
        observed_at: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            observed_at,
            outcome: PollOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self.outcome, PollOutcome::Success(_))
    }

    pub fn metrics(&self) -> Option<&DeviceMetrics> {
        match &self.outcome {
            PollOutcome::Success(m) => Some(m),
            PollOutcome::Failure { .. } => None,
        }
    }
}

/// One row of `MetricsStore::get_all`: registry identity plus latest result, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// None until the first poll attempt for this device has been committed.
    pub result: Option<PollResult>,
    pub last_attempt_at: Option<u64>,
}

impl DeviceStatus {
    pub fn is_online(&self) -> bool {
        self.result.as_ref().is_some_and(PollResult::is_online)
    }
}
