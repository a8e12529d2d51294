// Application Layer - Use Cases and Business Logic

pub mod dispatch;
pub mod estimate;
pub mod gate;
pub mod message;
pub mod partition;
pub mod queue_service;
pub mod threshold;

// Re-exports
pub use dispatch::{
    shutdown_channel, CycleOutcome, CycleReport, CycleState, DispatchCycle,
    NotificationScheduler, SchedulerHandle, ShutdownSender, ShutdownToken,
};
pub use estimate::WaitTimeEstimator;
pub use gate::{GateOutcome, NotificationGate};
pub use queue_service::{BoardRow, JoinRequest, PartitionCount, QueueService};
pub use threshold::{ThresholdEvaluator, ThresholdPolicy};
