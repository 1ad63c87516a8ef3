use std::fmt;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::models::{MuteKind, MuteStatus, MuteTarget, Timestamp};
use crate::db::queries::mute_target;
use crate::error::{Error, Result};
use crate::utils::key_locks::KeyLocks;

/// Durable mute records, one table per kind.
///
/// Every mutating call holds a lock scoped to its `(kind, key)` pair for the
/// duration of the write, so a user-initiated unmute and a timer-fired unmute
/// on the same key serialize while unrelated keys proceed independently.
#[derive(Clone)]
pub struct MuteStore {
    pool: SqlitePool,
    key_locks: KeyLocks,
}

impl MuteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            key_locks: KeyLocks::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All records of a kind. Rows that no longer parse are logged and left out.
    pub async fn get(&self, kind: MuteKind) -> Result<Vec<MuteTarget>> {
        let rows = mute_target::list_all(&self.pool, kind).await?;
        let mut targets = Vec::with_capacity(rows.len());

        for row in rows {
            let key = row.key.clone();
            match row.into_target(kind) {
                Ok(target) => targets.push(target),
                Err(e) => warn!("Skipping malformed {} record '{}': {}", kind, key, e),
            }
        }

        Ok(targets)
    }

    pub async fn find(&self, kind: MuteKind, key: &str) -> Result<Option<MuteTarget>> {
        match mute_target::get(&self.pool, kind, key).await? {
            Some(row) => row.into_target(kind).map(Some),
            None => Ok(None),
        }
    }

    /// Insert, or overwrite every field except the key. The stored generation
    /// is managed here and returned on the saved record.
    pub async fn upsert(&self, record: &MuteTarget) -> Result<MuteTarget> {
        record.validate()?;

        let _guard = self.key_locks.lock(record.kind, &record.key).await;
        let row = mute_target::upsert(&self.pool, record).await?;
        let saved = row.into_target(record.kind)?;

        debug!(
            "Upserted {} '{}' as {} (generation {})",
            saved.kind,
            saved.key,
            saved.status.as_str(),
            saved.generation
        );
        Ok(saved)
    }

    pub async fn delete(&self, kind: MuteKind, key: &str) -> Result<()> {
        let _guard = self.key_locks.lock(kind, key).await;
        if !mute_target::delete(&self.pool, kind, key).await? {
            return Err(Error::not_found(kind, key));
        }

        debug!("Deleted {} '{}'", kind, key);
        Ok(())
    }

    /// Mark muted until `unmuted_at`; an empty string mutes indefinitely
    pub async fn set_muted(&self, kind: MuteKind, key: &str, unmuted_at: &str) -> Result<MuteTarget> {
        let deadline = Timestamp::parse_optional(unmuted_at)?;
        self.transition(kind, key, MuteStatus::Muted, deadline).await
    }

    pub async fn set_unmuted(&self, kind: MuteKind, key: &str) -> Result<MuteTarget> {
        self.transition(kind, key, MuteStatus::Unmuted, None).await
    }

    /// Unmute only if the record is still muted at `generation`.
    ///
    /// `None` means the record was deleted, re-muted or unmuted since that
    /// generation was read, and nothing was written.
    pub async fn set_unmuted_if_generation(
        &self,
        kind: MuteKind,
        key: &str,
        generation: i64,
    ) -> Result<Option<MuteTarget>> {
        let _guard = self.key_locks.lock(kind, key).await;
        match mute_target::unmute_if_generation(&self.pool, kind, key, generation).await? {
            Some(row) => {
                let saved = row.into_target(kind)?;
                debug!(
                    "{} '{}' unmuted at generation {} (now {})",
                    kind, key, generation, saved.generation
                );
                Ok(Some(saved))
            }
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        kind: MuteKind,
        key: &str,
        status: MuteStatus,
        unmuted_at: Option<Timestamp>,
    ) -> Result<MuteTarget> {
        let _guard = self.key_locks.lock(kind, key).await;
        let row = mute_target::set_status(&self.pool, kind, key, status, unmuted_at)
            .await?
            .ok_or_else(|| Error::not_found(kind, key))?;

        let saved = row.into_target(kind)?;
        debug!(
            "{} '{}' is now {} (generation {})",
            kind,
            key,
            status.as_str(),
            saved.generation
        );
        Ok(saved)
    }

    /// Keys with a write in progress or queued
    pub fn locked_keys(&self) -> usize {
        self.key_locks.len()
    }

    pub async fn count(&self, kind: MuteKind) -> Result<i64> {
        Ok(mute_target::count(&self.pool, kind).await?)
    }
}

impl fmt::Debug for MuteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuteStore")
            .field("locked_keys", &self.locked_keys())
            .finish_non_exhaustive()
    }
}
