use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::db::convert::{i64_to_u64, opt_ms_to_ts, opt_ts_to_ms, parse_uuid, u64_to_i64};
use crate::session::model::{Session, SessionStatus};
use crate::session::repository::SessionRepository;
use crate::time::{from_ms, to_ms};

/// SQLx-backed implementation of SessionRepository.
/// Responsible only for persistence and row mapping.
///
/// Relies on the partial unique index `uq_sessions_active_pair`.
pub struct SqlxSessionRepository {
    pool: AnyPool,
}

impl SqlxSessionRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn fetch_active_for_pair(
        &self,
        user_id: &str,
        problem_slug: &str,
    ) -> anyhow::Result<Option<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = ? AND problem_slug = ? AND status = 'ACTIVE' \
             ORDER BY started_ms ASC, session_id ASC LIMIT 1;"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(problem_slug.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_session).transpose()
    }
}

const SESSION_COLUMNS: &str = r#"
  session_id, user_id, problem_slug, status,
  started_ms, completed_ms, elapsed_secs, submission_id
"#;

/// Attempts before giving up on a pair whose active session keeps
/// closing between our insert and our read.
const CREATE_ATTEMPTS: usize = 3;

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn fetch_by_id_and_user(
        &self,
        session_id: &Uuid,
        user_id: &str,
    ) -> anyhow::Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ? AND user_id = ?;");
        let row = sqlx::query(&sql)
            .bind(session_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_session(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_active_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = ? AND status = 'ACTIVE' \
             ORDER BY started_ms ASC, session_id ASC;"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(collect_sessions(rows))
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE status = 'ACTIVE' AND started_ms < ? \
             ORDER BY started_ms ASC, session_id ASC;"
        );
        let rows = sqlx::query(&sql)
            .bind(to_ms(cutoff))
            .fetch_all(&self.pool)
            .await?;

        Ok(collect_sessions(rows))
    }

    async fn create_active(&self, session: &Session) -> anyhow::Result<(Session, bool)> {
        for _ in 0..CREATE_ATTEMPTS {
            let res = sqlx::query(
                r#"
INSERT INTO sessions (
  session_id, user_id, problem_slug, status,
  started_ms, completed_ms, elapsed_secs, submission_id
) VALUES (?, ?, ?, 'ACTIVE', ?, NULL, NULL, NULL)
ON CONFLICT DO NOTHING;
"#,
            )
            .bind(session.session_id.to_string())
            .bind(session.user_id.clone())
            .bind(session.problem_slug.clone())
            .bind(to_ms(session.started_at))
            .execute(&self.pool)
            .await
            .context("insert session")?;

            let created = res.rows_affected() == 1;

            match self
                .fetch_active_for_pair(&session.user_id, &session.problem_slug)
                .await?
            {
                Some(active) => {
                    let ours = created && active.session_id == session.session_id;
                    return Ok((active, ours));
                }
                // Our own row finished already: report it as written.
                None if created => return Ok((session.clone(), true)),
                // The blocking row closed before we could read it; try again.
                None => continue,
            }
        }

        Err(anyhow::anyhow!(
            "could not settle active session for {}/{}",
            session.user_id,
            session.problem_slug
        ))
    }

    async fn finish_if_active(&self, session: &Session) -> anyhow::Result<bool> {
        let elapsed = session.elapsed_seconds.map(u64_to_i64).transpose()?;

        let res = sqlx::query(
            r#"
UPDATE sessions
SET status = ?, completed_ms = ?, elapsed_secs = ?, submission_id = ?
WHERE session_id = ? AND status = 'ACTIVE';
"#,
        )
        .bind(session.status.as_str().to_string())
        .bind(opt_ts_to_ms(session.completed_at))
        .bind(elapsed)
        .bind(session.submission_id.map(|id| id.to_string()))
        .bind(session.session_id.to_string())
        .execute(&self.pool)
        .await
        .context("finish session")?;

        Ok(res.rows_affected() == 1)
    }
}

/* =========================
Row mapping
========================= */

fn collect_sessions(rows: Vec<sqlx::any::AnyRow>) -> Vec<Session> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_session(&r) {
            Ok(s) => out.push(s),
            Err(e) => {
                // poison-row resilience: skip but don't fail the batch
                tracing::warn!(error = %e, "skipping malformed session row");
            }
        }
    }
    out
}

fn row_to_session(r: &sqlx::any::AnyRow) -> anyhow::Result<Session> {
    let id: String = r.try_get("session_id")?;
    let status: String = r.try_get("status")?;
    let elapsed: Option<i64> = r.try_get("elapsed_secs")?;
    let submission: Option<String> = r.try_get("submission_id")?;

    Ok(Session {
        session_id: parse_uuid(&id, "session_id")?,
        user_id: r.try_get("user_id")?,
        problem_slug: r.try_get("problem_slug")?,
        status: status.parse::<SessionStatus>()?,
        started_at: from_ms(r.try_get("started_ms")?)?,
        completed_at: opt_ms_to_ts(r.try_get("completed_ms")?)?,
        elapsed_seconds: elapsed.map(i64_to_u64).transpose()?,
        submission_id: submission
            .as_deref()
            .map(|s| parse_uuid(s, "submission_id"))
            .transpose()?,
    })
}
