// Domain models: device descriptors, poll results, aggregates

mod device;
mod poll;
mod summary;

pub use device::DeviceDescriptor;
pub use poll::{DeviceMetrics, DeviceStatus, PollOutcome, PollResult};
pub use summary::{AggregateSnapshot, CycleReport};
