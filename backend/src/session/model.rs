use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::submission::model::Submission;

/// Lifecycle of an attempt. `Completed` and `Abandoned` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "ABANDONED" => Ok(Self::Abandoned),
            other => Err(anyhow::anyhow!("unknown session status: {other}")),
        }
    }
}

/// One attempt at a problem by a user.
///
/// `completed_at` is set iff the status is terminal; `elapsed_seconds`
/// is set iff the status is `Completed`.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub problem_slug: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: Option<u64>,
    pub submission_id: Option<Uuid>,
}

impl Session {
    /// A fresh ACTIVE session starting at `now`.
    pub fn start(user_id: impl Into<String>, problem_slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            problem_slug: problem_slug.into(),
            status: SessionStatus::Active,
            started_at: now,
            completed_at: None,
            elapsed_seconds: None,
            submission_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// ACTIVE and started strictly before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_active() && self.started_at < cutoff
    }

    /// ACTIVE -> COMPLETED with `submission` attached.
    pub fn completed_with(&self, submission: &Submission, now: DateTime<Utc>) -> Result<Self, AppError> {
        self.ensure_active(SessionStatus::Completed)?;

        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        Ok(Self {
            status: SessionStatus::Completed,
            completed_at: Some(now),
            elapsed_seconds: Some(elapsed),
            submission_id: Some(submission.submission_id),
            ..self.clone()
        })
    }

    /// ACTIVE -> ABANDONED.
    pub fn abandoned(&self, now: DateTime<Utc>) -> Result<Self, AppError> {
        self.ensure_active(SessionStatus::Abandoned)?;

        Ok(Self {
            status: SessionStatus::Abandoned,
            completed_at: Some(now),
            ..self.clone()
        })
    }

    fn ensure_active(&self, to: SessionStatus) -> Result<(), AppError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(AppError::IllegalTransition {
                from: self.status,
                to,
            })
        }
    }
}

/// What a caller sees after any session operation.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub session: Session,
    pub submission: Option<Submission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn submission_for(s: &Session) -> Submission {
        Submission {
            submission_id: Uuid::new_v4(),
            external_id: "42".into(),
            session_id: s.session_id,
            user_id: s.user_id.clone(),
            problem_slug: s.problem_slug.clone(),
            submitted_at: t0(),
            status_text: "Accepted".into(),
            language: "rust".into(),
            runtime_ms: None,
            memory_mb: None,
            code: None,
        }
    }

    #[test]
    fn start_is_active_without_completion_fields() {
        let s = Session::start("u1", "two-sum", t0());
        assert!(s.is_active());
        assert!(s.completed_at.is_none());
        assert!(s.elapsed_seconds.is_none());
        assert!(s.submission_id.is_none());
    }

    #[test]
    fn completion_sets_elapsed_and_attaches_submission() {
        let s = Session::start("u1", "two-sum", t0());
        let sub = submission_for(&s);
        let now = t0() + chrono::Duration::seconds(754);

        let done = s.completed_with(&sub, now).unwrap();

        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.completed_at, Some(now));
        assert_eq!(done.elapsed_seconds, Some(754));
        assert_eq!(done.submission_id, Some(sub.submission_id));
    }

    #[test]
    fn abandon_sets_completed_at_but_no_elapsed() {
        let s = Session::start("u1", "two-sum", t0());
        let now = t0() + chrono::Duration::minutes(3);

        let gone = s.abandoned(now).unwrap();

        assert_eq!(gone.status, SessionStatus::Abandoned);
        assert_eq!(gone.completed_at, Some(now));
        assert!(gone.elapsed_seconds.is_none());
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let s = Session::start("u1", "two-sum", t0());
        let sub = submission_for(&s);
        let done = s.completed_with(&sub, t0()).unwrap();
        let gone = s.abandoned(t0()).unwrap();

        for terminal in [&done, &gone] {
            assert!(matches!(
                terminal.abandoned(t0()),
                Err(AppError::IllegalTransition { .. })
            ));
            assert!(matches!(
                terminal.completed_with(&sub, t0()),
                Err(AppError::IllegalTransition { .. })
            ));
        }
    }

    #[test]
    fn staleness_is_strict_and_active_only() {
        let s = Session::start("u1", "two-sum", t0());
        assert!(!s.is_stale(t0()));
        assert!(s.is_stale(t0() + chrono::Duration::seconds(1)));

        let gone = s.abandoned(t0()).unwrap();
        assert!(!gone.is_stale(t0() + chrono::Duration::hours(5)));
    }

    #[test]
    fn status_text_round_trips() {
        for st in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(st.as_str().parse::<SessionStatus>().unwrap(), st);
        }
        assert!("DONE".parse::<SessionStatus>().is_err());
    }
}
