use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};

use crate::db::convert::{i64_to_u32, opt_ms_to_ts};
use crate::progress::model::{Progress, ProgressStatus};
use crate::progress::repository::ProgressRepository;
use crate::time::to_ms;

/// SQLx-backed implementation of ProgressRepository.
/// Every transition is a single upsert statement.
pub struct SqlxProgressRepository {
    pool: AnyPool,
}

impl SqlxProgressRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepository for SqlxProgressRepository {
    async fn fetch(&self, user_id: &str, problem_slug: &str) -> anyhow::Result<Option<Progress>> {
        let row = sqlx::query(
            r#"
SELECT user_id, problem_slug, status, attempt_count, last_attempted_ms, completed_ms
FROM user_progress
WHERE user_id = ? AND problem_slug = ?;
"#,
        )
        .bind(user_id.to_string())
        .bind(problem_slug.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_progress(&r)?)),
            None => Ok(None),
        }
    }

    async fn mark_in_progress(
        &self,
        user_id: &str,
        problem_slug: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO user_progress (user_id, problem_slug, status, attempt_count, last_attempted_ms, completed_ms)
VALUES (?, ?, 'IN_PROGRESS', 1, ?, NULL)
ON CONFLICT (user_id, problem_slug) DO UPDATE SET
  status = 'IN_PROGRESS',
  attempt_count = user_progress.attempt_count + 1,
  last_attempted_ms = excluded.last_attempted_ms;
"#,
        )
        .bind(user_id.to_string())
        .bind(problem_slug.to_string())
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .context("mark progress in-progress")?;

        Ok(())
    }

    async fn mark_completed(
        &self,
        user_id: &str,
        problem_slug: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO user_progress (user_id, problem_slug, status, attempt_count, last_attempted_ms, completed_ms)
VALUES (?, ?, 'COMPLETED', 1, ?, ?)
ON CONFLICT (user_id, problem_slug) DO UPDATE SET
  status = 'COMPLETED',
  attempt_count = CASE WHEN user_progress.attempt_count < 1 THEN 1 ELSE user_progress.attempt_count END,
  last_attempted_ms = excluded.last_attempted_ms,
  completed_ms = excluded.completed_ms;
"#,
        )
        .bind(user_id.to_string())
        .bind(problem_slug.to_string())
        .bind(to_ms(now))
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .context("mark progress completed")?;

        Ok(())
    }
}

fn row_to_progress(r: &sqlx::any::AnyRow) -> anyhow::Result<Progress> {
    let status: String = r.try_get("status")?;

    Ok(Progress {
        user_id: r.try_get("user_id")?,
        problem_slug: r.try_get("problem_slug")?,
        status: status.parse::<ProgressStatus>()?,
        attempt_count: i64_to_u32(r.try_get("attempt_count")?)?,
        last_attempted_at: opt_ms_to_ts(r.try_get("last_attempted_ms")?)?,
        completed_at: opt_ms_to_ts(r.try_get("completed_ms")?)?,
    })
}
