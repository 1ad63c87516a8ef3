mod common;

use std::sync::Arc;
use std::time::Duration;

use timer_mute::db::models::{MuteKind, MuteStatus, MuteTarget, Timestamp};
use timer_mute::services::{MuteLifecycle, TimerOutcome, TokioScheduler, UnmuteReport};
use timer_mute::Error;
use tokio_test::{assert_err, assert_ok};

use common::{harness, memory_store, Call, FakeGateway};

#[tokio::test]
async fn indefinite_mute_then_delete() {
    let h = harness().await;

    let saved = assert_ok!(h.lifecycle.mute(MuteKind::Keyword, "foo", None).await);
    assert_eq!(saved.status, MuteStatus::Muted);
    assert_eq!(saved.unmuted_at, None);

    assert_eq!(h.gateway.calls(), vec![Call::Mute(MuteKind::Keyword, "foo".to_string())]);
    assert_eq!(h.scheduler.len(), 0);

    let records = h.store.get(MuteKind::Keyword).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, "foo");
    assert_eq!(Timestamp::format_optional(records[0].unmuted_at), "");

    assert_ok!(h.lifecycle.delete(MuteKind::Keyword, "foo").await);
    assert_eq!(h.gateway.calls().len(), 1, "delete must not call the gateway");
    assert!(h.store.find(MuteKind::Keyword, "foo").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_remote_mute_writes_nothing() {
    let h = harness().await;
    h.gateway.set_fail_mute(true);

    let err = assert_err!(
        h.lifecycle
            .mute(MuteKind::Account, "someone", Some(Duration::from_secs(60)))
            .await
    );
    assert!(matches!(err, Error::RemoteCallFailed { .. }));

    assert_eq!(h.gateway.mute_calls(), 1);
    assert_eq!(h.store.count(MuteKind::Account).await.unwrap(), 0);
    assert_eq!(h.scheduler.len(), 0);
}

#[tokio::test]
async fn failed_remote_mute_leaves_existing_record_untouched() {
    let h = harness().await;
    let before = h
        .lifecycle
        .mute(MuteKind::Keyword, "foo", None)
        .await
        .unwrap();

    h.gateway.set_fail_mute(true);
    assert_err!(
        h.lifecycle
            .mute(MuteKind::Keyword, "foo", Some(Duration::from_secs(60)))
            .await
    );

    let after = h.store.find(MuteKind::Keyword, "foo").await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_the_gateway() {
    let h = harness().await;

    assert!(matches!(
        h.lifecycle.mute(MuteKind::Keyword, "  ", None).await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        h.lifecycle
            .mute(MuteKind::Keyword, "foo", Some(Duration::from_millis(200)))
            .await,
        Err(Error::InvalidArgument(_))
    ));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn timed_mute_records_deadline_and_arms_one_timer() {
    let h = harness().await;

    let before = Timestamp::now();
    let saved = h
        .lifecycle
        .mute(MuteKind::Keyword, "spoiler", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    let after = Timestamp::now();

    let deadline = saved.unmuted_at.unwrap();
    assert!(deadline >= before.after(Duration::from_secs(60)).unwrap());
    assert!(deadline <= after.after(Duration::from_secs(60)).unwrap());
    assert_eq!(deadline, saved.updated_at.after(Duration::from_secs(60)).unwrap());
    assert_eq!(deadline.to_string().len(), "YYYY-MM-DD HH:MM:SS".len());

    assert_eq!(h.scheduler.delays(), vec![Duration::from_secs(60)]);
}

#[tokio::test]
async fn fired_timer_unmutes_the_record() {
    let h = harness().await;
    h.lifecycle
        .mute(MuteKind::Keyword, "spoiler", Some(Duration::from_secs(60)))
        .await
        .unwrap();

    for registration in h.scheduler.take_all() {
        assert_ok!(registration.action.await);
    }

    let record = h.store.find(MuteKind::Keyword, "spoiler").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
    assert_eq!(record.unmuted_at, None);
    assert_eq!(h.gateway.unmute_calls(), 1);
}

#[tokio::test]
async fn remute_makes_the_earlier_timer_stale() {
    let h = harness().await;
    h.lifecycle
        .mute(MuteKind::Keyword, "spoiler", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    let remuted = h
        .lifecycle
        .mute(MuteKind::Keyword, "spoiler", Some(Duration::from_secs(3600)))
        .await
        .unwrap();

    let mut registrations = h.scheduler.take_all();
    assert_eq!(registrations.len(), 2);

    // The first timer fires early and must not unmute the newer mute
    let first = registrations.remove(0);
    assert_ok!(first.action.await);
    let record = h.store.find(MuteKind::Keyword, "spoiler").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Muted);
    assert_eq!(record.generation, remuted.generation);
    assert_eq!(h.gateway.unmute_calls(), 0);

    let outcome = h
        .lifecycle
        .fire_unmute(MuteKind::Keyword, "spoiler", remuted.generation - 1)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TimerOutcome::Stale {
            expected: remuted.generation - 1,
            found: remuted.generation
        }
    );

    let second = registrations.remove(0);
    assert_ok!(second.action.await);
    let record = h.store.find(MuteKind::Keyword, "spoiler").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
}

#[tokio::test]
async fn remute_preserves_created_at() {
    let h = harness().await;
    let old = Timestamp::parse("2024-01-01 00:00:00").unwrap();
    let mut existing = MuteTarget::muted(MuteKind::Account, "someone", None);
    existing.status = MuteStatus::Unmuted;
    existing.created_at = old;
    h.store.upsert(&existing).await.unwrap();

    let saved = h
        .lifecycle
        .mute(MuteKind::Account, "someone", None)
        .await
        .unwrap();
    assert_eq!(saved.created_at, old);
    assert!(saved.updated_at > old);
    assert_eq!(h.store.count(MuteKind::Account).await.unwrap(), 1);
}

#[tokio::test]
async fn timer_for_deleted_record_is_a_no_op() {
    let h = harness().await;
    h.lifecycle
        .mute(MuteKind::Keyword, "gone", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    h.lifecycle.delete(MuteKind::Keyword, "gone").await.unwrap();

    for registration in h.scheduler.take_all() {
        assert_ok!(registration.action.await);
    }
    assert_eq!(h.gateway.unmute_calls(), 0);
    assert!(h.store.find(MuteKind::Keyword, "gone").await.unwrap().is_none());
}

#[tokio::test]
async fn unmute_clears_local_record_even_when_remote_fails() {
    let h = harness().await;
    h.lifecycle
        .mute(MuteKind::Account, "someone", Some(Duration::from_secs(600)))
        .await
        .unwrap();
    h.gateway.set_fail_unmute(true);

    let report = h.lifecycle.unmute(MuteKind::Account, "someone").await;
    assert_eq!(
        report,
        UnmuteReport {
            remote_applied: false,
            record_updated: true
        }
    );

    let record = h.store.find(MuteKind::Account, "someone").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
    assert_eq!(record.unmuted_at, None);
}

#[tokio::test]
async fn unmute_is_idempotent() {
    let h = harness().await;
    h.lifecycle.mute(MuteKind::Keyword, "foo", None).await.unwrap();

    let first = h.lifecycle.unmute(MuteKind::Keyword, "foo").await;
    assert!(first.remote_applied && first.record_updated);

    // The platform now reports it as not muted; the local update still succeeds
    let second = h.lifecycle.unmute(MuteKind::Keyword, "foo").await;
    assert!(!second.remote_applied);
    assert!(second.record_updated);

    let record = h.store.find(MuteKind::Keyword, "foo").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
}

#[tokio::test]
async fn unmute_of_untracked_key_reports_missing_record() {
    let h = harness().await;

    let report = h.lifecycle.unmute(MuteKind::Keyword, "never-seen").await;
    assert!(!report.record_updated);
    assert_eq!(h.gateway.unmute_calls(), 1);
}

#[tokio::test]
async fn delete_of_missing_record_is_not_found() {
    let h = harness().await;
    let err = assert_err!(h.lifecycle.delete(MuteKind::Account, "nobody").await);
    assert!(err.is_not_found());
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn store_failure_after_remote_mute_is_inconsistent_state() {
    let h = harness().await;
    sqlx::query("DROP TABLE mute_words")
        .execute(h.store.pool())
        .await
        .unwrap();

    let err = assert_err!(
        h.lifecycle
            .mute(MuteKind::Keyword, "foo", Some(Duration::from_secs(60)))
            .await
    );
    assert!(matches!(err, Error::InconsistentState { .. }));
    assert_eq!(h.gateway.mute_calls(), 1);
    assert_eq!(h.scheduler.len(), 0);
}

#[tokio::test]
async fn remote_listing_is_diagnostic_only() {
    let h = harness().await;
    h.lifecycle.mute(MuteKind::Account, "b", None).await.unwrap();
    h.lifecycle.mute(MuteKind::Account, "a", None).await.unwrap();

    let remote = h.lifecycle.remote_mutes(MuteKind::Account).await.unwrap();
    assert_eq!(remote, vec!["a".to_string(), "b".to_string()]);
    assert!(h.lifecycle.remote_mutes(MuteKind::Keyword).await.unwrap().is_empty());
}

#[tokio::test]
async fn real_scheduler_round_trip() {
    let gateway = Arc::new(FakeGateway::default());
    let scheduler = Arc::new(TokioScheduler::new());
    let store = memory_store().await;
    let lifecycle = MuteLifecycle::new(gateway.clone(), store.clone(), scheduler.clone());

    let saved = lifecycle
        .mute(MuteKind::Keyword, "brief", Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(saved.unmuted_at.is_some());
    assert_eq!(scheduler.pending(), 1);

    tokio::time::sleep(Duration::from_millis(1600)).await;

    let record = store.find(MuteKind::Keyword, "brief").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
    assert_eq!(record.unmuted_at, None);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(
        gateway.calls(),
        vec![
            Call::Mute(MuteKind::Keyword, "brief".to_string()),
            Call::Unmute(MuteKind::Keyword, "brief".to_string()),
        ]
    );
}

#[tokio::test]
async fn remute_written_during_remote_unmute_survives_the_timer() {
    let h = harness().await;
    let saved = h
        .lifecycle
        .mute(MuteKind::Keyword, "k", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    h.gateway.remute_during_unmute(h.store.clone());

    let outcome = h
        .lifecycle
        .fire_unmute(MuteKind::Keyword, "k", saved.generation)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TimerOutcome::Stale {
            expected: saved.generation,
            found: saved.generation + 1
        }
    );

    let record = h.store.find(MuteKind::Keyword, "k").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Muted);
    assert!(record.unmuted_at.is_some());
    assert_eq!(record.generation, saved.generation + 1);

    // The remote mute is put back to match the newer record
    assert_eq!(
        h.gateway.calls(),
        vec![
            Call::Mute(MuteKind::Keyword, "k".to_string()),
            Call::Unmute(MuteKind::Keyword, "k".to_string()),
            Call::Mute(MuteKind::Keyword, "k".to_string()),
        ]
    );
}

#[tokio::test]
async fn user_remute_waits_for_an_in_flight_timer() {
    let h = harness().await;
    let saved = h
        .lifecycle
        .mute(MuteKind::Account, "someone", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    h.gateway.set_unmute_delay(Duration::from_millis(200));

    let timer = {
        let lifecycle = h.lifecycle.clone();
        tokio::spawn(async move {
            lifecycle
                .fire_unmute(MuteKind::Account, "someone", saved.generation)
                .await
        })
    };

    // Let the timer reach the remote call before the user acts
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.gateway.unmute_calls(), 1);

    let remuted = h
        .lifecycle
        .mute(MuteKind::Account, "someone", Some(Duration::from_secs(3600)))
        .await
        .unwrap();

    let outcome = timer.await.unwrap().unwrap();
    assert!(matches!(outcome, TimerOutcome::Unmuted(_)));

    let record = h.store.find(MuteKind::Account, "someone").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Muted);
    assert_eq!(record.generation, remuted.generation);
    assert_eq!(record.unmuted_at, remuted.unmuted_at);
    assert_eq!(
        h.gateway.calls(),
        vec![
            Call::Mute(MuteKind::Account, "someone".to_string()),
            Call::Unmute(MuteKind::Account, "someone".to_string()),
            Call::Mute(MuteKind::Account, "someone".to_string()),
        ]
    );
    assert_eq!(h.scheduler.delays().last(), Some(&Duration::from_secs(3600)));
}

#[tokio::test]
async fn user_unmute_during_timer_runs_after_it() {
    let h = harness().await;
    let saved = h
        .lifecycle
        .mute(MuteKind::Keyword, "spoiler", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    h.gateway.set_unmute_delay(Duration::from_millis(100));

    let timer = {
        let lifecycle = h.lifecycle.clone();
        tokio::spawn(async move {
            lifecycle
                .fire_unmute(MuteKind::Keyword, "spoiler", saved.generation)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = h.lifecycle.unmute(MuteKind::Keyword, "spoiler").await;
    let outcome = timer.await.unwrap().unwrap();

    assert_eq!(
        outcome,
        TimerOutcome::Unmuted(UnmuteReport {
            remote_applied: true,
            record_updated: true
        })
    );
    // Already unmuted remotely by the timer; the local write still lands
    assert!(!report.remote_applied);
    assert!(report.record_updated);

    let record = h.store.find(MuteKind::Keyword, "spoiler").await.unwrap().unwrap();
    assert_eq!(record.status, MuteStatus::Unmuted);
    assert_eq!(record.generation, saved.generation + 2);
}

#[tokio::test]
async fn key_locks_are_released_after_operations() {
    let h = harness().await;
    h.lifecycle
        .mute(MuteKind::Keyword, "foo", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    h.lifecycle.unmute(MuteKind::Keyword, "foo").await;
    h.lifecycle.delete(MuteKind::Keyword, "foo").await.unwrap();

    assert_eq!(h.store.locked_keys(), 0);
}
