pub mod lifecycle;
pub mod reconciler;
pub mod scheduler;

pub use lifecycle::{MuteLifecycle, TimerOutcome, UnmuteReport};
pub use reconciler::{reconcile_on_startup, ReconcileSummary};
pub use scheduler::{ScheduleHandle, ScheduledAction, Scheduler, TokioScheduler};
