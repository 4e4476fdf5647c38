/// Scheduler module
///
/// Startup planning, the per-credential refresh workers, and the coordinator
/// that owns them.
pub mod coordinator;
pub mod plan;
pub mod worker;

pub use coordinator::SchedulerCoordinator;
pub use worker::{RefreshWorker, WorkerPolicy, WorkerState, WorkerStatus};
