//! Submission reconciler.
//!
//! Turns the judge's recent-submissions feed into at most one stored
//! `Submission` per session. One call is one poll; the caller owns the
//! cadence.
//!
//! Judge failures never escape: a timeout, transport error or malformed
//! payload is reported as `NoSubmission` with a reason, and the caller
//! polls again later. Storage errors do propagate.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::judge::client::JudgeClient;
use crate::judge::types::{JudgeAccount, JudgeCredential, JudgeEvent};
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::session::model::Session;
use crate::submission::model::Submission;
use crate::submission::repository::SubmissionRepository;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// A new submission was stored for the session.
    Fresh(Submission),
    /// Nothing new this poll.
    NoSubmission(NoSubmissionReason),
}

impl ReconcileOutcome {
    pub fn submission(&self) -> Option<&Submission> {
        match self {
            Self::Fresh(s) => Some(s),
            Self::NoSubmission(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoSubmissionReason {
    /// No event for this problem after the session started.
    NoMatch,
    /// Every matching event was already recorded.
    OnlyDuplicates,
    /// Another poll recorded the event between our check and insert.
    LostRace,
    JudgeUnavailable,
    JudgeTimeout,
    MissingCredentials,
    /// Session is terminal; the judge was not contacted.
    SessionClosed,
}

pub struct Reconciler {
    judge: Arc<dyn JudgeClient>,
    submissions: Arc<dyn SubmissionRepository>,
    /// Events inspected per poll (K).
    limit: usize,
    /// Bound on a single judge call.
    timeout: Duration,
    counters: Counters,
}

impl Reconciler {
    pub fn new(
        judge: Arc<dyn JudgeClient>,
        submissions: Arc<dyn SubmissionRepository>,
        limit: usize,
        timeout: Duration,
        counters: Counters,
    ) -> Self {
        Self {
            judge,
            submissions,
            limit: limit.max(1),
            timeout,
            counters,
        }
    }

    /// Polls the judge once for `session`.
    ///
    /// Scans events newest-first. The first matching event whose external id
    /// is not yet recorded is stored (atomically) and returned; recorded ones
    /// are skipped.
    #[instrument(
        skip(self, session, account),
        target = "reconcile",
        fields(session_id = %session.session_id, problem = %session.problem_slug)
    )]
    pub async fn reconcile(
        &self,
        session: &Session,
        account: Option<&JudgeAccount>,
    ) -> anyhow::Result<ReconcileOutcome> {
        if !session.is_active() {
            debug!(status = %session.status, "session closed; judge not contacted");
            return Ok(ReconcileOutcome::NoSubmission(
                NoSubmissionReason::SessionClosed,
            ));
        }

        Counters::bump(&self.counters.reconcile_polls);

        let Some(account) = account.filter(|a| a.is_configured()) else {
            warn!(user_id = %session.user_id, "no judge credentials configured");
            Counters::bump(&self.counters.judge_missing_credentials);
            return Ok(ReconcileOutcome::NoSubmission(
                NoSubmissionReason::MissingCredentials,
            ));
        };

        let events = match self.fetch_events(account).await {
            Ok(events) => events,
            Err(reason) => return Ok(ReconcileOutcome::NoSubmission(reason)),
        };

        let mut saw_duplicate = false;

        for event in events.iter().take(self.limit) {
            if !event.matches(&session.problem_slug, session.started_at) {
                continue;
            }

            if self
                .submissions
                .exists_by_external_id(&event.external_id)
                .await?
            {
                debug!(external_id = %event.external_id, "event already recorded; skipping");
                Counters::bump(&self.counters.reconcile_duplicate_skips);
                saw_duplicate = true;
                continue;
            }

            let submission = Submission::from_event(event, session.session_id, &session.user_id);

            let inserted = warn_if_slow("db_insert_submission", Duration::from_millis(50), async {
                self.submissions.insert_if_absent(&submission).await
            })
            .await?;

            if inserted {
                Counters::bump(&self.counters.reconcile_matched);
                info!(
                    external_id = %submission.external_id,
                    status = %submission.status_text,
                    submitted_at = %submission.submitted_at,
                    "new submission detected"
                );
                return Ok(ReconcileOutcome::Fresh(submission));
            }

            debug!(external_id = %event.external_id, "submission recorded concurrently");
            Counters::bump(&self.counters.reconcile_lost_races);
            return Ok(ReconcileOutcome::NoSubmission(NoSubmissionReason::LostRace));
        }

        let reason = if saw_duplicate {
            NoSubmissionReason::OnlyDuplicates
        } else {
            NoSubmissionReason::NoMatch
        };
        Ok(ReconcileOutcome::NoSubmission(reason))
    }

    /// Runs the judge query under the configured timeout.
    async fn fetch_events(&self, account: &JudgeAccount) -> Result<Vec<JudgeEvent>, NoSubmissionReason> {
        let call = warn_if_slow(
            "judge_recent_events",
            self.timeout / 2,
            self.judge.recent_events(account, self.limit),
        );

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(events)) => Ok(events),
            Ok(Err(e)) => {
                warn!(error = %e, "judge unavailable; treating as no submission");
                Counters::bump(&self.counters.judge_unavailable);
                Err(NoSubmissionReason::JudgeUnavailable)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "judge call timed out; treating as no submission"
                );
                Counters::bump(&self.counters.judge_timeouts);
                Err(NoSubmissionReason::JudgeTimeout)
            }
        }
    }

    /// Checks a credential against the judge's identity endpoint.
    /// Any failure counts as invalid.
    #[instrument(skip_all, target = "reconcile")]
    pub async fn validate_credential(&self, credential: &JudgeCredential) -> bool {
        match tokio::time::timeout(self.timeout, self.judge.validate_credential(credential)).await {
            Ok(Ok(signed_in)) => signed_in,
            Ok(Err(e)) => {
                warn!(error = %e, "credential validation failed");
                false
            }
            Err(_) => {
                warn!("credential validation timed out");
                false
            }
        }
    }
}
