#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use lanki::catalog::StaticCatalog;
use lanki::judge::{JudgeAccount, JudgeClient, JudgeCredential, JudgeError, JudgeEvent};
use lanki::metrics::counters::Counters;
use lanki::progress::memory::InMemoryProgressRepository;
use lanki::reconcile::Reconciler;
use lanki::session::manager::SessionManager;
use lanki::session::memory::InMemorySessionRepository;
use lanki::submission::memory::InMemorySubmissionRepository;

pub const USER: &str = "u1";
pub const TWO_SUM: &str = "two-sum";
pub const LRU: &str = "lru-cache";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

pub fn event(id: &str, slug: &str, submitted_at: DateTime<Utc>, status: &str) -> JudgeEvent {
    JudgeEvent {
        external_id: id.to_string(),
        problem_slug: slug.to_string(),
        submitted_at,
        status_text: status.to_string(),
        language: "rust".to_string(),
    }
}

pub fn account() -> JudgeAccount {
    JudgeAccount {
        username: "alice".to_string(),
        credential: JudgeCredential {
            session_token: "sess".to_string(),
            csrf_token: Some("csrf".to_string()),
        },
    }
}

/// Scripted judge: returns its events newest first, counts calls.
#[derive(Default)]
pub struct FakeJudge {
    events: Mutex<Vec<JudgeEvent>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeJudge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, e: JudgeEvent) {
        self.events.lock().push(e);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn delay(&self, d: Duration) {
        *self.delay.lock() = Some(d);
    }
}

#[async_trait]
impl JudgeClient for FakeJudge {
    async fn recent_events(
        &self,
        _account: &JudgeAccount,
        limit: usize,
    ) -> Result<Vec<JudgeEvent>, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(JudgeError::InvalidResponse("judge down".into()));
        }

        let mut v = self.events.lock().clone();
        v.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        v.truncate(limit);
        Ok(v)
    }

    async fn validate_credential(&self, c: &JudgeCredential) -> Result<bool, JudgeError> {
        Ok(c.session_token == "sess")
    }
}

/// Manager over in-memory storage with handles to every part.
pub struct Harness {
    pub judge: Arc<FakeJudge>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub submissions: Arc<InMemorySubmissionRepository>,
    pub progress: Arc<InMemoryProgressRepository>,
    pub counters: Counters,
    pub manager: Arc<SessionManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_limit(5, Duration::from_secs(10))
    }

    pub fn with_limit(limit: usize, timeout: Duration) -> Self {
        let judge = FakeJudge::new();
        let sessions = Arc::new(InMemorySessionRepository::new());
        let submissions = Arc::new(InMemorySubmissionRepository::new());
        let progress = Arc::new(InMemoryProgressRepository::new());
        let counters = Counters::default();

        let reconciler = Reconciler::new(
            judge.clone(),
            submissions.clone(),
            limit,
            timeout,
            counters.clone(),
        );

        let manager = Arc::new(SessionManager::new(
            sessions.clone(),
            submissions.clone(),
            progress.clone(),
            Arc::new(StaticCatalog::from_slugs([TWO_SUM, LRU])),
            reconciler,
            counters.clone(),
        ));

        Self {
            judge,
            sessions,
            submissions,
            progress,
            counters,
            manager,
        }
    }
}
