#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use timer_mute::db::models::{MuteKind, MuteTarget, Timestamp};
use timer_mute::db::{pool, MuteStore};
use timer_mute::gateway::{GatewayError, MuteGateway};
use timer_mute::services::{MuteLifecycle, ScheduleHandle, ScheduledAction, Scheduler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Mute(MuteKind, String),
    Unmute(MuteKind, String),
    List(MuteKind),
}

/// Records every call; individual operations can be told to fail
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    active: Mutex<HashSet<(MuteKind, String)>>,
    pub fail_mute: Mutex<bool>,
    pub fail_unmute: Mutex<bool>,
    unmute_delay: Mutex<Option<Duration>>,
    remute_during_unmute: Mutex<Option<MuteStore>>,
}

impl FakeGateway {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mute_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Mute(..)))
            .count()
    }

    pub fn unmute_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Unmute(..)))
            .count()
    }

    pub fn set_fail_mute(&self, fail: bool) {
        *self.fail_mute.lock().unwrap() = fail;
    }

    pub fn set_fail_unmute(&self, fail: bool) {
        *self.fail_unmute.lock().unwrap() = fail;
    }

    /// Make every remote unmute take this long
    pub fn set_unmute_delay(&self, delay: Duration) {
        *self.unmute_delay.lock().unwrap() = Some(delay);
    }

    /// While an unmute is in flight, write a fresh one-hour mute straight into
    /// `store`, as a writer outside the lifecycle would
    pub fn remute_during_unmute(&self, store: MuteStore) {
        *self.remute_during_unmute.lock().unwrap() = Some(store);
    }
}

impl MuteGateway for FakeGateway {
    async fn apply_mute(&self, kind: MuteKind, key: &str) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Mute(kind, key.to_string()));
        if *self.fail_mute.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "over capacity".to_string(),
            });
        }
        self.active.lock().unwrap().insert((kind, key.to_string()));
        Ok(())
    }

    async fn apply_unmute(&self, kind: MuteKind, key: &str) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Unmute(kind, key.to_string()));

        let delay = *self.unmute_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let store = self.remute_during_unmute.lock().unwrap().clone();
        if let Some(store) = store {
            let until = Timestamp::now().after(Duration::from_secs(3600)).ok();
            store
                .upsert(&MuteTarget::muted(kind, key, until))
                .await
                .map_err(|e| GatewayError::Other(e.to_string()))?;
        }

        if *self.fail_unmute.lock().unwrap() {
            return Err(GatewayError::Other("connection reset".to_string()));
        }
        if !self.active.lock().unwrap().remove(&(kind, key.to_string())) {
            return Err(GatewayError::KeywordNotFound(key.to_string()));
        }
        Ok(())
    }

    async fn list_active_mutes(&self, kind: MuteKind) -> Result<Vec<String>, GatewayError> {
        self.calls.lock().unwrap().push(Call::List(kind));
        let mut keys: Vec<String> = self
            .active
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

pub struct Registration {
    pub delay: Duration,
    pub label: String,
    pub action: ScheduledAction,
}

/// Keeps registered actions instead of running them
#[derive(Default)]
pub struct RecordingScheduler {
    registrations: Mutex<Vec<Registration>>,
}

impl RecordingScheduler {
    pub fn len(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.delay)
            .collect()
    }

    /// Remove every registered action, oldest first
    pub fn take_all(&self) -> Vec<Registration> {
        std::mem::take(&mut *self.registrations.lock().unwrap())
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration, label: String, action: ScheduledAction) -> ScheduleHandle {
        self.registrations.lock().unwrap().push(Registration {
            delay,
            label,
            action,
        });
        ScheduleHandle::detached()
    }
}

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub scheduler: Arc<RecordingScheduler>,
    pub store: MuteStore,
    pub lifecycle: MuteLifecycle<FakeGateway>,
}

pub async fn memory_store() -> MuteStore {
    let pool = pool::create_memory_pool().await.unwrap();
    pool::run_migrations(&pool).await.unwrap();
    MuteStore::new(pool)
}

pub async fn harness() -> Harness {
    let gateway = Arc::new(FakeGateway::default());
    let scheduler = Arc::new(RecordingScheduler::default());
    let store = memory_store().await;
    let lifecycle = MuteLifecycle::new(gateway.clone(), store.clone(), scheduler.clone());

    Harness {
        gateway,
        scheduler,
        store,
        lifecycle,
    }
}
