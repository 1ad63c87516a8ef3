use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Error;

/// Work run once a deferred delay has elapsed
pub type ScheduledAction = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;

/// Identifies one registered timer. Dropping it does not cancel anything.
#[derive(Debug)]
pub struct ScheduleHandle {
    id: Uuid,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    pub fn new(id: Uuid, task: Option<JoinHandle<()>>) -> Self {
        Self { id, task }
    }

    /// Handle for a scheduler that keeps no background task
    pub fn detached() -> Self {
        Self::new(Uuid::new_v4(), None)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(false)
    }
}

/// One-shot deferred execution without cancellation
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, label: String, action: ScheduledAction) -> ScheduleHandle;
}

/// Runs each action on its own tokio task after sleeping for the delay.
///
/// Pending timers are plain runtime tasks: they never keep the process alive,
/// and anything still sleeping when the runtime shuts down is simply dropped.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    pending: Arc<AtomicUsize>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers registered but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, label: String, action: ScheduledAction) -> ScheduleHandle {
        let id = Uuid::new_v4();
        let pending = self.pending.clone();
        pending.fetch_add(1, Ordering::SeqCst);

        info!("Unmute timer {} set for {} in {:?}", id, label, delay);

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Unmute timer {} fired for {}", id, label);

            // Run on a child task so a panic is contained and reported here
            match tokio::spawn(action).await {
                Ok(Ok(())) => debug!("Unmute timer {} for {} completed", id, label),
                Ok(Err(e)) => warn!("Unmute timer {} for {} failed: {}", id, label, e),
                Err(e) => error!("Unmute timer {} for {} panicked: {:?}", id, label, e),
            }

            pending.fetch_sub(1, Ordering::SeqCst);
        });

        ScheduleHandle::new(id, Some(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn runs_action_after_delay() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let handle = scheduler.schedule(
            Duration::from_millis(20),
            "test".to_string(),
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<(), Error>(())
            }),
        );

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(handle.is_finished());
        assert_eq!(scheduler.pending(), 0);
    }

    async fn fail() -> Result<(), Error> {
        Err(Error::custom("boom"))
    }

    async fn explode() -> Result<(), Error> {
        panic!("timer body panicked")
    }

    #[tokio::test]
    async fn swallows_errors_and_panics() {
        let scheduler = TokioScheduler::new();

        let failing = scheduler.schedule(
            Duration::from_millis(5),
            "failing".to_string(),
            Box::pin(fail()),
        );
        let panicking = scheduler.schedule(
            Duration::from_millis(5),
            "panicking".to_string(),
            Box::pin(explode()),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(failing.is_finished());
        assert!(panicking.is_finished());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn detached_handle_is_never_finished() {
        let handle = ScheduleHandle::detached();
        assert!(!handle.is_finished());
        assert_ne!(handle.id(), ScheduleHandle::detached().id());
    }
}
