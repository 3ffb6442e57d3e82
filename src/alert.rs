// Alerting extension point. Nothing ships behind it; the scheduler runs the same with or without a hook.

use crate::models::{AggregateSnapshot, PollResult};

/// Called by the scheduler after every completed cycle.
/// Runs on the scheduler task, so implementations must return quickly (hand off to a channel if needed).
/// A panic inside the hook is caught and logged; polling carries on.
pub trait AlertHook: Send + Sync {
    /// `failures` holds this cycle's Failure results, in completion order.
    fn on_cycle(&self, summary: &AggregateSnapshot, failures: &[PollResult]);
}
