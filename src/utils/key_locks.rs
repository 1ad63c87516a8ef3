use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::models::MuteKind;

type LockMap = DashMap<(MuteKind, String), Arc<Mutex<()>>>;

/// One async mutex per `(kind, key)`, created on demand.
///
/// An entry lives only while someone holds or waits for it, so the map stays
/// as small as the number of keys currently being worked on.
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<LockMap>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, kind: MuteKind, key: &str) -> KeyGuard {
        let id = (kind, key.to_string());
        let lock = self.locks.entry(id.clone()).or_default().clone();
        let guard = lock.lock_owned().await;

        KeyGuard {
            locks: self.locks.clone(),
            id,
            guard: Some(guard),
        }
    }

    /// Keys with a live holder or waiter
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one key; releases and prunes its map entry on drop
pub struct KeyGuard {
    locks: Arc<LockMap>,
    id: (MuteKind, String),
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release first; the entry then has no other owner unless someone is queued on it
        self.guard.take();
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
