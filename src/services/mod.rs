//! Application services.

pub mod completion_reconciler;
pub mod insights_aggregator;
pub mod metrics;
pub mod sweep_daemon;
pub mod test_locks;
pub mod variation_check_worker;

pub use completion_reconciler::{CompletionReconciler, ReconcilerConfig};
pub use insights_aggregator::InsightsAggregator;
pub use sweep_daemon::{
    DaemonHandle, DaemonStatus, StopReason, StopSignal, SweepDaemon, SweepDaemonConfig,
    SweepDaemonEvent,
};
pub use test_locks::TestLocks;
pub use variation_check_worker::{
    DrainReport, JobResult, QueueMaintenance, VariationCheckWorker, WorkerConfig,
};
