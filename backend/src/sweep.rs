//! Stale-session sweep. The core only exposes the pass; the binary owns the timer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::session::manager::SessionManager;

/// Concurrent abandons per pass.
const SWEEP_CONCURRENCY: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StalePolicy {
    /// Move stale sessions to ABANDONED.
    Abandon,
    /// Log them and leave them ACTIVE.
    ReportOnly,
}

impl fmt::Display for StalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abandon => f.write_str("abandon"),
            Self::ReportOnly => f.write_str("report"),
        }
    }
}

impl FromStr for StalePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abandon" => Ok(Self::Abandon),
            "report" | "report-only" | "report_only" => Ok(Self::ReportOnly),
            other => Err(anyhow::anyhow!("unknown stale session policy: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// ACTIVE sessions older than the cutoff when the pass began.
    pub stale: usize,
    /// How many of those this pass moved to ABANDONED.
    pub abandoned: usize,
}

/// One pass over sessions that have been ACTIVE longer than `max_age`.
///
/// A session completed or abandoned concurrently is skipped, never overwritten.
/// A failure on one session is logged and does not stop the pass.
#[instrument(skip(manager, now), target = "sweep")]
pub async fn sweep_stale_sessions(
    manager: &SessionManager,
    max_age: Duration,
    policy: StalePolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport, AppError> {
    let max_age = chrono::Duration::from_std(max_age)
        .map_err(|e| AppError::InvalidInput(format!("stale age out of range: {e}")))?;
    let cutoff = now
        .checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let stale = manager.find_stale(cutoff).await?;
    let mut report = SweepReport {
        stale: stale.len(),
        abandoned: 0,
    };

    if stale.is_empty() {
        return Ok(report);
    }

    if policy == StalePolicy::ReportOnly {
        for session in &stale {
            warn!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                problem = %session.problem_slug,
                started_at = %session.started_at,
                "stale session left active"
            );
        }
        return Ok(report);
    }

    let results: Vec<_> = stream::iter(stale)
        .map(|session| async move {
            let outcome = manager.abandon_stale(&session, now).await;
            (session, outcome)
        })
        .buffer_unordered(SWEEP_CONCURRENCY)
        .collect()
        .await;

    for (session, result) in results {
        match result {
            Ok(true) => report.abandoned += 1,
            Ok(false) => {}
            Err(e) => warn!(session_id = %session.session_id, error = %e, "failed to abandon stale session"),
        }
    }

    info!(stale = report.stale, abandoned = report.abandoned, "stale sweep finished");
    Ok(report)
}
