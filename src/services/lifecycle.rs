use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::db::models::{MuteKind, MuteTarget, Timestamp};
use crate::db::MuteStore;
use crate::error::{Error, Result};
use crate::gateway::MuteGateway;
use crate::services::scheduler::{ScheduleHandle, Scheduler};
use crate::utils::key_locks::KeyLocks;

/// What an unmute actually managed to change. Unmute never fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmuteReport {
    pub remote_applied: bool,
    pub record_updated: bool,
}

/// Outcome of a timer firing for a specific record generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Unmuted(UnmuteReport),
    /// The record was re-muted (or unmuted) after this timer was registered
    Stale { expected: i64, found: i64 },
    /// The record was deleted in the meantime
    Gone,
}

/// Ties the remote gateway, the record store and the scheduler together.
///
/// Cheap to clone; timer callbacks carry their own clone and re-read the
/// record before acting. Mute, unmute, delete and timer runs on the same key
/// are serialized from the first read to the last write, remote call included.
pub struct MuteLifecycle<G> {
    gateway: Arc<G>,
    store: MuteStore,
    scheduler: Arc<dyn Scheduler>,
    op_locks: KeyLocks,
}

impl<G> Clone for MuteLifecycle<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            store: self.store.clone(),
            scheduler: self.scheduler.clone(),
            op_locks: self.op_locks.clone(),
        }
    }
}

impl<G: MuteGateway> MuteLifecycle<G> {
    pub fn new(gateway: Arc<G>, store: MuteStore, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            gateway,
            store,
            scheduler,
            op_locks: KeyLocks::new(),
        }
    }

    pub fn store(&self) -> &MuteStore {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Mute remotely, record it, and arm an unmute timer when a duration is given.
    ///
    /// A remote failure aborts before anything is written. A store failure
    /// after a successful remote mute is reported as `InconsistentState`.
    pub async fn mute(
        &self,
        kind: MuteKind,
        key: &str,
        duration: Option<Duration>,
    ) -> Result<MuteTarget> {
        if key.trim().is_empty() {
            return Err(Error::invalid(format!("{} key must not be empty", kind)));
        }
        if let Some(d) = duration {
            if d < Duration::from_secs(1) {
                return Err(Error::invalid(format!(
                    "mute duration must be at least one second, got {:?}",
                    d
                )));
            }
        }

        let _op = self.op_locks.lock(kind, key).await;
        info!("Mute {} '{}' -> start", kind, key);
        let now = Timestamp::now();
        let unmuted_at = match duration {
            Some(d) => Some(now.after(d)?),
            None => None,
        };

        if let Err(e) = self.gateway.apply_mute(kind, key).await {
            warn!("Remote mute of {} '{}' failed: {}", kind, key, e);
            return Err(Error::RemoteCallFailed {
                kind,
                key: key.to_string(),
                source: e,
            });
        }
        debug!("'{}' is muted remotely", key);

        let saved = match self.save_muted(kind, key, now, unmuted_at).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(
                    "Reconciliation gap: {} '{}' is muted remotely but the local record was not saved: {}",
                    kind, key, e
                );
                return Err(Error::InconsistentState {
                    kind,
                    key: key.to_string(),
                    source: Box::new(e),
                });
            }
        };

        if let Some(d) = duration {
            self.schedule_unmute(kind, key, d, saved.generation);
            info!(
                "Unmute timer will fire at {}, target '{}'",
                Timestamp::format_optional(saved.unmuted_at),
                key
            );
        }

        info!("Mute {} '{}' -> done", kind, key);
        Ok(saved)
    }

    async fn save_muted(
        &self,
        kind: MuteKind,
        key: &str,
        now: Timestamp,
        unmuted_at: Option<Timestamp>,
    ) -> Result<MuteTarget> {
        let mut record = MuteTarget::muted(kind, key, unmuted_at);
        record.updated_at = now;
        record.created_at = match self.store.find(kind, key).await? {
            Some(existing) if existing.created_at <= now => existing.created_at,
            _ => now,
        };
        self.store.upsert(&record).await
    }

    /// Unmute remotely and locally. Each step's failure is logged and the
    /// other step still runs, so a local record never stays stuck muted.
    pub async fn unmute(&self, kind: MuteKind, key: &str) -> UnmuteReport {
        let _op = self.op_locks.lock(kind, key).await;
        info!("Unmute {} '{}' -> start", kind, key);

        let remote_applied = self.remote_unmute(kind, key).await;

        let record_updated = match self.store.set_unmuted(kind, key).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Local unmute of {} '{}' failed: {}", kind, key, e);
                false
            }
        };

        info!("Unmute {} '{}' -> done", kind, key);
        UnmuteReport {
            remote_applied,
            record_updated,
        }
    }

    async fn remote_unmute(&self, kind: MuteKind, key: &str) -> bool {
        match self.gateway.apply_unmute(kind, key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Remote unmute of {} '{}' failed: {}", kind, key, e);
                false
            }
        }
    }

    /// Remove the local record only; the remote mute is left as is.
    pub async fn delete(&self, kind: MuteKind, key: &str) -> Result<()> {
        let _op = self.op_locks.lock(kind, key).await;
        self.store.delete(kind, key).await?;
        info!("Deleted {} '{}' from tracking", kind, key);
        Ok(())
    }

    pub async fn records(&self, kind: MuteKind) -> Result<Vec<MuteTarget>> {
        self.store.get(kind).await
    }

    pub async fn remote_mutes(&self, kind: MuteKind) -> Result<Vec<String>> {
        self.gateway
            .list_active_mutes(kind)
            .await
            .map_err(|e| Error::RemoteCallFailed {
                kind,
                key: String::new(),
                source: e,
            })
    }

    /// Arm a timer that unmutes `key` unless the record moved past `generation`
    pub fn schedule_unmute(
        &self,
        kind: MuteKind,
        key: &str,
        delay: Duration,
        generation: i64,
    ) -> ScheduleHandle {
        let lifecycle = self.clone();
        let owned_key = key.to_string();

        self.scheduler.schedule(
            delay,
            format!("{} '{}'", kind, key),
            Box::pin(async move {
                lifecycle
                    .fire_unmute(kind, &owned_key, generation)
                    .await
                    .map(|_| ())
            }),
        )
    }

    /// Timer body: re-read the record and only unmute the generation it was armed for.
    ///
    /// The local write is conditional on that generation, so a record changed
    /// behind the lifecycle's back while the remote call was in flight keeps
    /// its newer state.
    pub async fn fire_unmute(
        &self,
        kind: MuteKind,
        key: &str,
        generation: i64,
    ) -> Result<TimerOutcome> {
        let _op = self.op_locks.lock(kind, key).await;
        info!("Timer run {} '{}' -> start", kind, key);

        let current = match self.store.find(kind, key).await? {
            Some(current) => current,
            None => {
                info!("{} '{}' was deleted before its timer fired", kind, key);
                return Ok(TimerOutcome::Gone);
            }
        };

        if current.generation != generation || !current.is_muted() {
            info!(
                "Skipping stale timer for {} '{}' (armed for generation {}, record at {})",
                kind, key, generation, current.generation
            );
            return Ok(TimerOutcome::Stale {
                expected: generation,
                found: current.generation,
            });
        }

        let remote_applied = self.remote_unmute(kind, key).await;

        let record_updated = match self.store.set_unmuted_if_generation(kind, key, generation).await {
            Ok(Some(_)) => true,
            Ok(None) => return self.settle_lost_race(kind, key, generation, remote_applied).await,
            Err(e) => {
                warn!("Local unmute of {} '{}' failed: {}", kind, key, e);
                false
            }
        };

        info!("Timer run {} '{}' -> done", kind, key);
        Ok(TimerOutcome::Unmuted(UnmuteReport {
            remote_applied,
            record_updated,
        }))
    }

    /// The record moved past `generation` during the remote unmute
    async fn settle_lost_race(
        &self,
        kind: MuteKind,
        key: &str,
        generation: i64,
        remote_applied: bool,
    ) -> Result<TimerOutcome> {
        let Some(current) = self.store.find(kind, key).await? else {
            info!("{} '{}' was deleted while its timer ran", kind, key);
            return Ok(TimerOutcome::Gone);
        };

        warn!(
            "{} '{}' changed while its timer ran (armed for generation {}, record at {})",
            kind, key, generation, current.generation
        );

        // The newer record says muted, so put the remote mute back
        if current.is_muted() && remote_applied {
            if let Err(e) = self.gateway.apply_mute(kind, key).await {
                error!(
                    "Reconciliation gap: {} '{}' is muted locally but the remote mute could not be restored: {}",
                    kind, key, e
                );
            }
        }

        Ok(TimerOutcome::Stale {
            expected: generation,
            found: current.generation,
        })
    }
}
