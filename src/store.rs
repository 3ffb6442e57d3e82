// Latest-result cache, one entry per device, shared by the scheduler and the API.
// A single coarse lock guards the map; entries are replaced wholesale, never merged.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::aggregate;
use crate::models::{AggregateSnapshot, DeviceStatus, PollResult};
use crate::registry::DeviceRegistry;

#[derive(Debug, Clone)]
struct DeviceEntry {
    result: PollResult,
    last_attempt_at: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, DeviceEntry>,
    /// Set on shutdown; every later put is discarded.
    sealed: bool,
}

pub struct MetricsStore {
    registry: Arc<DeviceRegistry>,
    state: RwLock<StoreState>,
}

impl MetricsStore {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Latest result for `name`, or None if the device was never polled (or is unknown).
    pub async fn get(&self, name: &str) -> Option<PollResult> {
        let state = self.state.read().await;
        state.entries.get(name).map(|e| e.result.clone())
    }

    /// All registered devices in registry order, each with its latest result if any.
    /// Taken under one read lock, so it is a point-in-time view (possibly mid-cycle).
    pub async fn get_all(&self) -> Vec<DeviceStatus> {
        let state = self.state.read().await;
        self.registry
            .devices()
            .iter()
            .map(|d| {
                let entry = state.entries.get(&d.name);
                DeviceStatus {
                    name: d.name.clone(),
                    host: d.host.clone(),
                    port: d.port,
                    result: entry.map(|e| e.result.clone()),
                    last_attempt_at: entry.map(|e| e.last_attempt_at),
                }
            })
            .collect()
    }

    /// Replaces the entry for `result.device_name`. Returns false when the store is sealed
    /// or the device is not in the registry; the result is dropped in both cases.
    pub async fn put(&self, result: PollResult) -> bool {
        if self.registry.position(&result.device_name).is_none() {
            tracing::warn!(
                device = %result.device_name,
                operation = "store_put",
                "result for unregistered device discarded"
            );
            return false;
        }
        let mut state = self.state.write().await;
        if state.sealed {
            return false;
        }
        let last_attempt_at = result.observed_at;
        state.entries.insert(
            result.device_name.clone(),
            DeviceEntry {
                result,
                last_attempt_at,
            },
        );
        true
    }

    /// Stops accepting writes. Called by the scheduler once shutdown has begun.
    pub async fn seal(&self) {
        self.state.write().await.sealed = true;
    }

    pub async fn is_sealed(&self) -> bool {
        self.state.read().await.sealed
    }

    pub async fn summary(&self) -> AggregateSnapshot {
        aggregate::summarize(&self.get_all().await)
    }
}
