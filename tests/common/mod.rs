// Shared test helpers: registries, metrics builders, and a scriptable probe
#![allow(dead_code)]

use netpoll::models::{DeviceDescriptor, DeviceMetrics};
use netpoll::probe::{Probe, ProbeError};
use netpoll::registry::DeviceRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn device(name: &str, host: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        name: name.into(),
        host: host.into(),
        port: 161,
        community: "public".into(),
    }
}

/// Registry with devices named as given, on hosts 10.0.0.1, 10.0.0.2, ...
pub fn registry(names: &[&str]) -> Arc<DeviceRegistry> {
    let devices = names
        .iter()
        .enumerate()
        .map(|(i, n)| device(n, &format!("10.0.0.{}", i + 1)))
        .collect();
    Arc::new(DeviceRegistry::from_descriptors(devices).unwrap())
}

pub fn metrics(cpu: f64) -> DeviceMetrics {
    DeviceMetrics {
        sys_name: Some("test".into()),
        uptime_secs: 3600,
        cpu_load: Some(cpu),
        memory_used_pct: Some(cpu),
        interfaces_up: 2,
        interfaces_total: 4,
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Ok(DeviceMetrics),
    Fail(String),
    /// Answer with these metrics after a delay.
    Slow(Duration, DeviceMetrics),
    /// Never answer.
    Hang,
    Panic,
}

/// Probe whose per-device answers are scripted; counts calls and concurrent probes per device.
#[derive(Default)]
pub struct FakeProbe {
    behaviors: Mutex<HashMap<String, Behavior>>,
    pub calls: AtomicUsize,
    in_flight: Mutex<HashMap<String, usize>>,
    pub max_in_flight_per_device: AtomicUsize,
}

impl FakeProbe {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Arc<Self> {
        let probe = Self::default();
        for (name, b) in behaviors {
            probe.set(name, b.clone());
        }
        Arc::new(probe)
    }

    pub fn set(&self, name: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(name.to_string(), behavior);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Tracks one in-flight probe; released on completion or when the probe future is dropped.
struct InFlight<'a> {
    probe: &'a FakeProbe,
    name: String,
}

impl<'a> InFlight<'a> {
    fn enter(probe: &'a FakeProbe, name: &str) -> Self {
        let mut map = probe.in_flight.lock().unwrap();
        let n = map.entry(name.to_string()).or_insert(0);
        *n += 1;
        probe
            .max_in_flight_per_device
            .fetch_max(*n, Ordering::SeqCst);
        Self {
            probe,
            name: name.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut map) = self.probe.in_flight.lock()
            && let Some(n) = map.get_mut(&self.name)
        {
            *n -= 1;
        }
    }
}

impl Probe for FakeProbe {
    async fn probe(
        &self,
        device: &DeviceDescriptor,
        _timeout: Duration,
    ) -> Result<DeviceMetrics, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&device.name)
            .cloned()
            .unwrap_or_else(|| Behavior::Fail("unscripted device".into()));
        let _guard = InFlight::enter(self, &device.name);
        match behavior {
            Behavior::Ok(m) => Ok(m),
            Behavior::Fail(reason) => Err(ProbeError::Unreachable(reason)),
            Behavior::Slow(delay, m) => {
                tokio::time::sleep(delay).await;
                Ok(m)
            }
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("probe blew up"),
        }
    }
}
