mod common;

use std::time::Duration;

use common::*;
use lanki::metrics::counters::Counters;
use lanki::session::model::SessionStatus;
use lanki::sweep::{StalePolicy, SweepReport, sweep_stale_sessions};

const TWO_HOURS: Duration = Duration::from_secs(2 * 60 * 60);

#[tokio::test]
async fn abandons_only_sessions_past_the_cutoff() {
    let h = Harness::new();
    let old = h.manager.start(USER, TWO_SUM, t0()).await.unwrap().session;
    let fresh = h.manager.start(USER, LRU, at(3 * 3600)).await.unwrap().session;

    let now = at(3 * 3600 + 60);
    let report = sweep_stale_sessions(&h.manager, TWO_HOURS, StalePolicy::Abandon, now)
        .await
        .unwrap();
    assert_eq!(report, SweepReport { stale: 1, abandoned: 1 });

    let old = h.manager.get(USER, old.session_id).await.unwrap().session;
    assert_eq!(old.status, SessionStatus::Abandoned);
    assert_eq!(old.completed_at, Some(now));

    let fresh = h.manager.get(USER, fresh.session_id).await.unwrap().session;
    assert_eq!(fresh.status, SessionStatus::Active);

    assert_eq!(Counters::read(&h.counters.sessions_swept), 1);
}

#[tokio::test]
async fn report_only_leaves_sessions_active() {
    let h = Harness::new();
    let s = h.manager.start(USER, TWO_SUM, t0()).await.unwrap().session;

    let report = sweep_stale_sessions(&h.manager, TWO_HOURS, StalePolicy::ReportOnly, at(3 * 3600))
        .await
        .unwrap();
    assert_eq!(report, SweepReport { stale: 1, abandoned: 0 });

    let s = h.manager.get(USER, s.session_id).await.unwrap().session;
    assert_eq!(s.status, SessionStatus::Active);
}

#[tokio::test]
async fn finished_sessions_are_never_swept() {
    let h = Harness::new();
    let id = h.manager.start(USER, TWO_SUM, t0()).await.unwrap().session.session_id;
    h.judge.push(event("1", TWO_SUM, at(60), "Accepted"));
    h.manager.check(USER, id, Some(&account()), at(61)).await.unwrap();

    let report = sweep_stale_sessions(&h.manager, TWO_HOURS, StalePolicy::Abandon, at(10 * 3600))
        .await
        .unwrap();
    assert_eq!(report, SweepReport::default());
}

#[tokio::test]
async fn sweep_does_not_overwrite_a_concurrent_completion() {
    let h = Harness::new();
    let snapshot = h.manager.start(USER, TWO_SUM, t0()).await.unwrap().session;

    // The sweep read the session while ACTIVE; completion lands first.
    h.judge.push(event("2", TWO_SUM, at(60), "Accepted"));
    h.manager
        .check(USER, snapshot.session_id, Some(&account()), at(61))
        .await
        .unwrap();

    let written = h.manager.abandon_stale(&snapshot, at(3 * 3600)).await.unwrap();
    assert!(!written);

    let stored = h.manager.get(USER, snapshot.session_id).await.unwrap();
    assert_eq!(stored.session.status, SessionStatus::Completed);
    assert!(stored.submission.is_some());
}
