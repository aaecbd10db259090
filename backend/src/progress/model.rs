use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(anyhow::anyhow!("unknown progress status: {other}")),
        }
    }
}

/// Per (user, problem) attempt bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub user_id: String,
    pub problem_slug: String,
    pub status: ProgressStatus,
    pub attempt_count: u32,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Progress {
    pub fn not_started(user_id: impl Into<String>, problem_slug: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            problem_slug: problem_slug.into(),
            status: ProgressStatus::NotStarted,
            attempt_count: 0,
            last_attempted_at: None,
            completed_at: None,
        }
    }

    /// A new attempt began. A previously completed problem goes back
    /// to IN_PROGRESS.
    pub fn attempted(mut self, now: DateTime<Utc>) -> Self {
        self.status = ProgressStatus::InProgress;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempted_at = Some(now);
        self
    }

    /// An accepted solution was observed.
    pub fn completed(mut self, now: DateTime<Utc>) -> Self {
        self.status = ProgressStatus::Completed;
        self.attempt_count = self.attempt_count.max(1);
        self.last_attempted_at = Some(now);
        self.completed_at = Some(now);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn attempts_accumulate_and_completion_keeps_count() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let p = Progress::not_started("u1", "two-sum").attempted(t).attempted(t);
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.attempt_count, 2);

        let done = p.completed(t);
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.attempt_count, 2);
        assert_eq!(done.completed_at, Some(t));
    }

    #[test]
    fn completion_without_attempt_counts_one() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let done = Progress::not_started("u1", "two-sum").completed(t);
        assert_eq!(done.attempt_count, 1);
    }
}
