// Pure summary over a get_all() snapshot: online/offline counts and averages.
// Averages only include online devices; undefined averages are None, not 0.

use crate::models::{AggregateSnapshot, DeviceMetrics, DeviceStatus, PollResult};

/// Summarizes the given device rows. Never fails; an empty slice yields 0% online and no averages.
pub fn summarize(devices: &[DeviceStatus]) -> AggregateSnapshot {
    let total = devices.len();
    let online_count = devices.iter().filter(|d| d.is_online()).count();
    let online: Vec<&DeviceMetrics> = devices
        .iter()
        .filter_map(|d| d.result.as_ref().and_then(PollResult::metrics))
        .collect();
    let offline_count = total - online_count;

    let online_pct = if total == 0 {
        0.0
    } else {
        online_count as f64 / total as f64 * 100.0
    };

    AggregateSnapshot {
        total,
        online: online_count,
        offline: offline_count,
        online_pct,
        offline_pct: 100.0 - online_pct,
        avg_cpu: mean(online.iter().filter_map(|m| m.cpu_load)),
        avg_memory: mean(online.iter().filter_map(|m| m.memory_used_pct)),
        avg_interface_availability: mean(
            online.iter().filter_map(|m| m.interface_availability()),
        ),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}
