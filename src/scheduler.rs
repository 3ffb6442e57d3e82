// Poll scheduler: one long-lived task, one cycle per tick.
// A cycle fans out one probe per device and commits each result as soon as it lands.
// Cycles never overlap: ticks that come due while a cycle runs are skipped, not queued,
// and the next cycle starts on the fixed cadence.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

use crate::alert::AlertHook;
use crate::models::{CycleReport, PollResult};
use crate::probe::Probe;
use crate::registry::DeviceRegistry;
use crate::store::MetricsStore;

/// Failure reason recorded when a probe does not finish within its timeout.
pub const TIMEOUT_REASON: &str = "timeout";

/// Shared state and channels for the scheduler task.
pub struct SchedulerDeps<P: Probe> {
    pub registry: Arc<DeviceRegistry>,
    pub store: Arc<MetricsStore>,
    pub probe: Arc<P>,
    /// Receives one report per completed cycle (for /ws/status).
    pub tx: broadcast::Sender<CycleReport>,
    pub alert_hook: Option<Arc<dyn AlertHook>>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Per-device budget; expected to be strictly less than `interval`.
    pub probe_timeout: Duration,
    /// How often to log scheduler stats at INFO level.
    pub stats_log_interval: Duration,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Probes issued (one per registered device).
    pub probed: usize,
    pub committed: usize,
    pub online: usize,
    pub offline: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed {
        stats: CycleStats,
        /// This cycle's Failure results, in completion order.
        failures: Vec<PollResult>,
    },
    /// Shutdown fired mid-cycle. Outstanding probes were aborted and the store sealed.
    Cancelled,
}

/// Runs one poll cycle over every registered device.
///
/// Each probe runs in its own task bounded by `probe_timeout`; results are written to the
/// store in completion order. If `shutdown` resolves first, remaining probes are aborted,
/// the store is sealed, and nothing further is committed.
pub async fn run_cycle<P, S>(
    registry: &DeviceRegistry,
    store: &MetricsStore,
    probe: &Arc<P>,
    probe_timeout: Duration,
    shutdown: &mut S,
) -> CycleOutcome
where
    P: Probe,
    S: Future + Unpin,
{
    let started = Instant::now();
    let mut tasks = JoinSet::new();
    let mut task_devices = HashMap::with_capacity(registry.len());

    for device in registry.devices() {
        let probe = Arc::clone(probe);
        let device = device.clone();
        let name = device.name.clone();
        let handle = tasks.spawn(async move {
            let observed_at = now_ms();
            match tokio::time::timeout(probe_timeout, probe.probe(&device, probe_timeout)).await {
                Ok(Ok(metrics)) => PollResult::success(&device.name, observed_at, metrics),
                Ok(Err(e)) => PollResult::failure(&device.name, observed_at, e.to_string()),
                Err(_) => PollResult::failure(&device.name, observed_at, TIMEOUT_REASON),
            }
        });
        task_devices.insert(handle.id(), name);
    }

    let mut stats = CycleStats {
        probed: task_devices.len(),
        ..Default::default()
    };
    let mut failures = Vec::new();
    let cycle_observed_at = now_ms();

    loop {
        tokio::select! {
            biased;
            _ = &mut *shutdown => {
                tasks.abort_all();
                store.seal().await;
                tracing::debug!(
                    committed = stats.committed,
                    outstanding = tasks.len(),
                    "poll cycle cancelled"
                );
                return CycleOutcome::Cancelled;
            }
            joined = tasks.join_next_with_id() => {
                let result = match joined {
                    None => break,
                    Some(Ok((_, result))) => result,
                    Some(Err(e)) => {
                        let name = task_devices.get(&e.id()).cloned().unwrap_or_default();
                        tracing::warn!(device = %name, error = %e, "probe task failed");
                        PollResult::failure(name, cycle_observed_at, format!("probe task failed: {}", e))
                    }
                };

                if result.is_online() {
                    stats.online += 1;
                } else {
                    stats.offline += 1;
                    tracing::debug!(
                        device = %result.device_name,
                        reason = ?result.outcome,
                        "device offline"
                    );
                    failures.push(result.clone());
                }
                if store.put(result).await {
                    stats.committed += 1;
                }
            }
        }
    }

    stats.elapsed = started.elapsed();
    CycleOutcome::Completed { stats, failures }
}

pub fn spawn<P: Probe>(deps: SchedulerDeps<P>, config: SchedulerConfig) -> tokio::task::JoinHandle<()> {
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "scheduler",
        interval_secs = config.interval.as_secs(),
        devices = deps.registry.len()
    );
    tokio::spawn(run(deps, config).instrument(span))
}

/// Seals the store, then signals the scheduler task and waits for it to exit.
/// No result can be committed once the signal has been sent.
pub async fn shutdown(
    store: &MetricsStore,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
) {
    store.seal().await;
    let _ = shutdown_tx.send(());
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }
}

async fn run<P: Probe>(deps: SchedulerDeps<P>, config: SchedulerConfig) {
    let SchedulerDeps {
        registry,
        store,
        probe,
        tx,
        alert_hook,
        mut shutdown_rx,
    } = deps;
    let SchedulerConfig {
        interval: poll_interval,
        probe_timeout,
        stats_log_interval,
    } = config;

    let mut tick = interval(poll_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats_log_tick = interval(stats_log_interval);
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of an interval fires immediately; the stats log should not.
    stats_log_tick.reset();

    let mut cycles_completed: u64 = 0;
    let mut cycles_overrun: u64 = 0;
    let mut last_online: usize = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                store.seal().await;
                tracing::debug!("Scheduler shutting down");
                break;
            }
            scheduled = tick.tick() => {
                let outcome = run_cycle(&registry, &store, &probe, probe_timeout, &mut shutdown_rx).await;
                let (stats, failures) = match outcome {
                    CycleOutcome::Completed { stats, failures } => (stats, failures),
                    CycleOutcome::Cancelled => {
                        tracing::debug!("Scheduler shutting down mid-cycle");
                        break;
                    }
                };
                cycles_completed += 1;
                last_online = stats.online;
                let now = Instant::now();
                if now > scheduled + poll_interval {
                    // Drop every tick that came due during the cycle; resume on the fixed cadence.
                    let (next, skipped) = next_aligned_tick(scheduled, now, poll_interval);
                    tick.reset_at(next);
                    cycles_overrun += 1;
                    tracing::warn!(
                        elapsed_ms = stats.elapsed.as_millis() as u64,
                        skipped_ticks = skipped,
                        "poll cycle overran the interval"
                    );
                }
                tracing::debug!(
                    cycle = cycles_completed,
                    probed = stats.probed,
                    online = stats.online,
                    offline = stats.offline,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    "poll cycle complete"
                );

                let devices = store.get_all().await;
                let summary = crate::aggregate::summarize(&devices);
                if let Some(hook) = &alert_hook {
                    let call = AssertUnwindSafe(|| hook.on_cycle(&summary, &failures));
                    if let Err(panic) = std::panic::catch_unwind(call) {
                        tracing::error!(
                            cycle = cycles_completed,
                            error = panic_message(&*panic),
                            "alert hook panicked"
                        );
                    }
                }
                let report = CycleReport {
                    cycle: cycles_completed,
                    completed_at: now_ms(),
                    summary,
                    devices,
                };
                if tx.send(report).is_err() {
                    tracing::trace!(
                        operation = "broadcast_cycle",
                        "No active WebSocket clients; broadcast channel has no receivers"
                    );
                }
            }
            _ = stats_log_tick.tick() => {
                tracing::info!(
                    devices = registry.len(),
                    cycles_completed,
                    cycles_overrun,
                    online = last_online,
                    ws_status_clients = tx.receiver_count(),
                    "scheduler stats"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// First tick of the `period` grid anchored at `scheduled` that lies after `now`,
/// plus how many grid ticks were passed over on the way.
fn next_aligned_tick(scheduled: Instant, now: Instant, period: Duration) -> (Instant, u64) {
    let periods = now.duration_since(scheduled).as_nanos() / period.as_nanos().max(1) + 1;
    let periods = u32::try_from(periods).unwrap_or(u32::MAX);
    (scheduled + period * periods, u64::from(periods) - 1)
}

/// Wall-clock time in ms since the Unix epoch (0 if the clock is before the epoch).
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
