use std::time::Duration;

use tracing::{debug, info, warn};

use crate::constants::timeouts::RECONCILE_FLOOR_SECONDS;
use crate::db::models::{MuteKind, MuteTarget, Timestamp};
use crate::error::{Error, Result};
use crate::gateway::MuteGateway;
use crate::services::lifecycle::{MuteLifecycle, TimerOutcome};

/// Counts from one startup pass over a kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub unmuted_now: usize,
    pub scheduled: usize,
    pub permanent: usize,
    /// Deleted between listing and processing
    pub missing: usize,
    /// Re-muted or unmuted between listing and processing
    pub changed: usize,
    pub failed: usize,
}

enum Restore {
    Permanent,
    UnmutedNow,
    Scheduled,
    Changed,
}

/// Re-arm timers for every muted record of `kind`, unmuting overdue ones inline.
///
/// Runs once at startup before the front end accepts input. A failure on one
/// record is logged and does not stop the rest.
pub async fn reconcile_on_startup<G: MuteGateway>(
    lifecycle: &MuteLifecycle<G>,
    kind: MuteKind,
) -> Result<ReconcileSummary> {
    info!("Restoring {} unmute timers...", kind);

    let records = lifecycle.store().get(kind).await?;
    let mut summary = ReconcileSummary::default();

    for record in records.into_iter().filter(MuteTarget::is_muted) {
        summary.scanned += 1;

        match restore_one(lifecycle, &record).await {
            Ok(Restore::Permanent) => summary.permanent += 1,
            Ok(Restore::UnmutedNow) => summary.unmuted_now += 1,
            Ok(Restore::Scheduled) => summary.scheduled += 1,
            Ok(Restore::Changed) => summary.changed += 1,
            Err(e) if e.is_not_found() => {
                info!("{} '{}' disappeared before it was restored", kind, record.key);
                summary.missing += 1;
            }
            Err(e) => {
                warn!("Failed to restore timer for {} '{}': {}", kind, record.key, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Reconciled {}: {} muted, {} unmuted now, {} scheduled, {} permanent, {} skipped, {} failed",
        kind,
        summary.scanned,
        summary.unmuted_now,
        summary.scheduled,
        summary.permanent,
        summary.missing + summary.changed,
        summary.failed
    );
    Ok(summary)
}

async fn restore_one<G: MuteGateway>(
    lifecycle: &MuteLifecycle<G>,
    record: &MuteTarget,
) -> Result<Restore> {
    let Some(deadline) = record.unmuted_at else {
        debug!("{} '{}' is muted indefinitely", record.kind, record.key);
        return Ok(Restore::Permanent);
    };

    // Earlier records may have spent a while on remote calls
    let remaining = deadline.seconds_from(Timestamp::now().as_naive());
    if remaining < RECONCILE_FLOOR_SECONDS {
        // The deadline passed while the process was not running
        info!(
            "{} '{}' was due at {}, unmuting now",
            record.kind, record.key, deadline
        );
        return match lifecycle
            .fire_unmute(record.kind, &record.key, record.generation)
            .await?
        {
            TimerOutcome::Unmuted(_) => Ok(Restore::UnmutedNow),
            TimerOutcome::Stale { .. } => Ok(Restore::Changed),
            TimerOutcome::Gone => Err(Error::not_found(record.kind, &record.key)),
        };
    }

    // The listing may be stale by now; act on what is stored at this moment
    let current = lifecycle
        .store()
        .find(record.kind, &record.key)
        .await?
        .ok_or_else(|| Error::not_found(record.kind, &record.key))?;
    if current.generation != record.generation || !current.is_muted() {
        debug!("{} '{}' changed since listing, leaving it alone", record.kind, record.key);
        return Ok(Restore::Changed);
    }

    lifecycle.schedule_unmute(
        record.kind,
        &record.key,
        Duration::from_secs_f64(remaining),
        record.generation,
    );
    Ok(Restore::Scheduled)
}
