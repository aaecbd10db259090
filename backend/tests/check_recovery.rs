mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::*;
use lanki::catalog::StaticCatalog;
use lanki::error::AppError;
use lanki::metrics::counters::Counters;
use lanki::progress::memory::InMemoryProgressRepository;
use lanki::reconcile::Reconciler;
use lanki::session::manager::SessionManager;
use lanki::session::memory::InMemorySessionRepository;
use lanki::session::model::{Session, SessionStatus};
use lanki::session::repository::SessionRepository;
use lanki::submission::memory::InMemorySubmissionRepository;

/// Session store whose next completion write fails once.
#[derive(Default)]
struct FlakySessions {
    inner: InMemorySessionRepository,
    fail_next_finish: AtomicBool,
}

#[async_trait]
impl SessionRepository for FlakySessions {
    async fn fetch_by_id_and_user(&self, session_id: &Uuid, user_id: &str) -> Result<Option<Session>> {
        self.inner.fetch_by_id_and_user(session_id, user_id).await
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        self.inner.list_active_by_user(user_id).await
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>> {
        self.inner.list_stale(cutoff).await
    }

    async fn create_active(&self, session: &Session) -> Result<(Session, bool)> {
        self.inner.create_active(session).await
    }

    async fn finish_if_active(&self, session: &Session) -> Result<bool> {
        if self.fail_next_finish.swap(false, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("transient db error"));
        }
        self.inner.finish_if_active(session).await
    }
}

struct Setup {
    judge: Arc<FakeJudge>,
    sessions: Arc<FlakySessions>,
    submissions: Arc<InMemorySubmissionRepository>,
    manager: SessionManager,
}

fn setup() -> Setup {
    let judge = FakeJudge::new();
    let sessions = Arc::new(FlakySessions::default());
    let submissions = Arc::new(InMemorySubmissionRepository::new());
    let counters = Counters::default();

    let reconciler = Reconciler::new(
        judge.clone(),
        submissions.clone(),
        5,
        Duration::from_secs(10),
        counters.clone(),
    );
    let manager = SessionManager::new(
        sessions.clone(),
        submissions.clone(),
        Arc::new(InMemoryProgressRepository::new()),
        Arc::new(StaticCatalog::from_slugs([TWO_SUM])),
        reconciler,
        counters,
    );

    Setup {
        judge,
        sessions,
        submissions,
        manager,
    }
}

#[tokio::test]
async fn failed_completion_write_is_finished_on_next_check() {
    let s = setup();
    let id = s.manager.start(USER, TWO_SUM, t0()).await.unwrap().session.session_id;
    s.judge.push(event("900", TWO_SUM, at(60), "Accepted"));

    s.sessions.fail_next_finish.store(true, Ordering::SeqCst);
    let err = s.manager.check(USER, id, Some(&account()), at(61)).await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(s.submissions.len(), 1);

    let calls = s.judge.calls();
    let snap = s.manager.check(USER, id, Some(&account()), at(90)).await.unwrap();

    assert_eq!(snap.session.status, SessionStatus::Completed);
    assert_eq!(snap.submission.as_ref().map(|x| x.external_id.as_str()), Some("900"));
    assert_eq!(snap.session.submission_id, snap.submission.map(|x| x.submission_id));
    // the recorded submission is used as is
    assert_eq!(s.judge.calls(), calls);
    assert_eq!(s.submissions.len(), 1);
}

#[tokio::test]
async fn newer_event_after_failed_write_does_not_replace_recorded_one() {
    let s = setup();
    let id = s.manager.start(USER, TWO_SUM, t0()).await.unwrap().session.session_id;
    s.judge.push(event("900", TWO_SUM, at(60), "Wrong Answer"));

    s.sessions.fail_next_finish.store(true, Ordering::SeqCst);
    assert!(s.manager.check(USER, id, Some(&account()), at(61)).await.is_err());

    s.judge.push(event("901", TWO_SUM, at(120), "Accepted"));
    let snap = s.manager.check(USER, id, Some(&account()), at(130)).await.unwrap();

    assert_eq!(snap.session.status, SessionStatus::Completed);
    assert_eq!(snap.submission.unwrap().external_id, "900");
}
