//! Session lifecycle.
//!
//! ACTIVE -> COMPLETED (only through a reconciled submission)
//! ACTIVE -> ABANDONED (explicit, or by the stale sweep)
//!
//! Every mutation is a single-row compare-and-set against ACTIVE, so a
//! session that reached a terminal state is never touched again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::ProblemCatalog;
use crate::error::AppError;
use crate::judge::types::{JudgeAccount, JudgeCredential};
use crate::logger::{annotate_span, root_span, warn_if_slow};
use crate::metrics::counters::Counters;
use crate::progress::repository::ProgressRepository;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::session::model::{Session, SessionSnapshot, SessionStatus};
use crate::session::repository::SessionRepository;
use crate::submission::repository::SubmissionRepository;

pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    progress: Arc<dyn ProgressRepository>,
    catalog: Arc<dyn ProblemCatalog>,
    reconciler: Reconciler,
    counters: Counters,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        progress: Arc<dyn ProgressRepository>,
        catalog: Arc<dyn ProblemCatalog>,
        reconciler: Reconciler,
        counters: Counters,
    ) -> Self {
        Self {
            sessions,
            submissions,
            progress,
            catalog,
            reconciler,
            counters,
        }
    }

    /// Starts an attempt, or returns the pair's existing ACTIVE one unchanged.
    #[instrument(skip(self, now), target = "session")]
    pub async fn start(
        &self,
        user_id: &str,
        problem_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        if !self.catalog.contains(problem_slug).await? {
            return Err(AppError::not_found("problem", problem_slug));
        }

        let candidate = Session::start(user_id, problem_slug, now);
        let (session, created) = warn_if_slow("db_create_session", Duration::from_millis(50), async {
            self.sessions.create_active(&candidate).await
        })
        .await?;

        if created {
            Counters::bump(&self.counters.sessions_started);
            info!(session_id = %session.session_id, "session started");
            self.record_progress(self.progress.mark_in_progress(user_id, problem_slug, now))
                .await;
        } else {
            Counters::bump(&self.counters.sessions_resumed);
            warn!(session_id = %session.session_id, "active session already exists; returning it");
        }

        Ok(SessionSnapshot {
            session,
            submission: None,
        })
    }

    /// One poll of the judge for this session.
    ///
    /// Terminal sessions return their stored snapshot without a judge call.
    /// Judge trouble leaves the session ACTIVE; only storage failures error.
    pub async fn check(
        &self,
        user_id: &str,
        session_id: Uuid,
        account: Option<&JudgeAccount>,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        self.check_in_span(user_id, session_id, account, now)
            .instrument(root_span("session_check"))
            .await
    }

    async fn check_in_span(
        &self,
        user_id: &str,
        session_id: Uuid,
        account: Option<&JudgeAccount>,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        annotate_span(user_id, Some(&session_id));

        let session = self.load(user_id, &session_id).await?;
        if session.status.is_terminal() {
            debug!(status = %session.status, "terminal session; returning stored snapshot");
            return self.snapshot(session).await;
        }

        // A submission recorded by an earlier check whose completion write
        // never landed finishes the session; the judge is not asked again.
        let recorded = self.submissions.fetch_by_session(&session_id).await?;
        let submission = match recorded {
            Some(s) => {
                warn!(
                    external_id = %s.external_id,
                    "completing session from previously recorded submission"
                );
                s
            }
            None => match self.reconciler.reconcile(&session, account).await? {
                ReconcileOutcome::Fresh(s) => s,
                ReconcileOutcome::NoSubmission(reason) => {
                    debug!(?reason, "no submission this poll");
                    return Ok(SessionSnapshot {
                        session,
                        submission: None,
                    });
                }
            },
        };

        let completed = session.completed_with(&submission, now)?;
        if !self.sessions.finish_if_active(&completed).await? {
            // Abandoned (or swept) between our read and write.
            warn!(
                external_id = %submission.external_id,
                "session left ACTIVE before completion could be recorded"
            );
            let stored = self.load(user_id, &session_id).await?;
            return self.snapshot(stored).await;
        }

        Counters::bump(&self.counters.sessions_completed);
        info!(
            elapsed_seconds = ?completed.elapsed_seconds,
            status = %submission.status_text,
            "session completed"
        );

        if submission.is_accepted() {
            self.record_progress(self.progress.mark_completed(user_id, &completed.problem_slug, now))
                .await;
        }

        Ok(SessionSnapshot {
            session: completed,
            submission: Some(submission),
        })
    }

    /// Explicit give-up. Only legal from ACTIVE.
    #[instrument(skip(self, now), target = "session")]
    pub async fn abandon(
        &self,
        user_id: &str,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        let session = self.load(user_id, &session_id).await?;
        let abandoned = session.abandoned(now)?;

        if !self.sessions.finish_if_active(&abandoned).await? {
            let stored = self.load(user_id, &session_id).await?;
            return Err(AppError::IllegalTransition {
                from: stored.status,
                to: SessionStatus::Abandoned,
            });
        }

        Counters::bump(&self.counters.sessions_abandoned);
        info!("session abandoned");
        self.snapshot(abandoned).await
    }

    pub async fn get(&self, user_id: &str, session_id: Uuid) -> Result<SessionSnapshot, AppError> {
        let session = self.load(user_id, &session_id).await?;
        self.snapshot(session).await
    }

    /// ACTIVE sessions for a user. Should a pair ever hold two, only the
    /// earliest-started one is reported.
    #[instrument(skip(self), target = "session")]
    pub async fn active_sessions(&self, user_id: &str) -> Result<Vec<SessionSnapshot>, AppError> {
        let mut out: Vec<SessionSnapshot> = Vec::new();

        // repository returns oldest first
        for session in self.sessions.list_active_by_user(user_id).await? {
            if out
                .iter()
                .any(|s| s.session.problem_slug == session.problem_slug)
            {
                warn!(
                    session_id = %session.session_id,
                    problem = %session.problem_slug,
                    "duplicate active session for pair; keeping earliest"
                );
                continue;
            }
            out.push(SessionSnapshot {
                session,
                submission: None,
            });
        }

        Ok(out)
    }

    /// ACTIVE sessions started before `cutoff`.
    pub async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>, AppError> {
        Ok(self.sessions.list_stale(cutoff).await?)
    }

    /// Abandon on behalf of the stale sweep. `false` if the session had
    /// already left ACTIVE.
    #[instrument(skip(self, session, now), target = "session", fields(session_id = %session.session_id))]
    pub async fn abandon_stale(&self, session: &Session, now: DateTime<Utc>) -> Result<bool, AppError> {
        let abandoned = match session.abandoned(now) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };

        let written = self.sessions.finish_if_active(&abandoned).await?;
        if written {
            Counters::bump(&self.counters.sessions_swept);
            info!(started_at = %session.started_at, "stale session abandoned");
        }
        Ok(written)
    }

    /// Lightweight judge identity check, independent of polling.
    pub async fn validate_credential(&self, credential: &JudgeCredential) -> bool {
        self.reconciler.validate_credential(credential).await
    }

    async fn load(&self, user_id: &str, session_id: &Uuid) -> Result<Session, AppError> {
        self.sessions
            .fetch_by_id_and_user(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("session", session_id))
    }

    async fn snapshot(&self, session: Session) -> Result<SessionSnapshot, AppError> {
        let submission = if session.submission_id.is_some() || session.status.is_terminal() {
            self.submissions.fetch_by_session(&session.session_id).await?
        } else {
            None
        };
        Ok(SessionSnapshot {
            session,
            submission,
        })
    }

    /// Progress is bookkeeping; its failures never fail a session operation.
    async fn record_progress<F>(&self, fut: F)
    where
        F: std::future::Future<Output = anyhow::Result<()>>,
    {
        if let Err(e) = fut.await {
            warn!(error = %e, "failed to record progress");
        }
    }
}
