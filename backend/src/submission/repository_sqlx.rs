use anyhow::Context;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::db::convert::{i64_to_u32, parse_uuid};
use crate::submission::model::Submission;
use crate::submission::repository::SubmissionRepository;
use crate::time::{from_ms, to_ms};

/// SQLx-backed implementation of SubmissionRepository.
///
/// Deduplication relies on the UNIQUE constraints on `external_id` and
/// `session_id`; concurrent inserts serialize in the database.
pub struct SqlxSubmissionRepository {
    pool: AnyPool,
}

impl SqlxSubmissionRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionRepository for SqlxSubmissionRepository {
    async fn exists_by_external_id(&self, external_id: &str) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 AS hit FROM submissions WHERE external_id = ?;")
            .bind(external_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_if_absent(&self, s: &Submission) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
INSERT INTO submissions (
  submission_id, external_id, session_id, user_id, problem_slug,
  submitted_ms, status_text, language,
  runtime_ms, memory_mb, code
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT DO NOTHING;
"#,
        )
        .bind(s.submission_id.to_string())
        .bind(s.external_id.clone())
        .bind(s.session_id.to_string())
        .bind(s.user_id.clone())
        .bind(s.problem_slug.clone())
        .bind(to_ms(s.submitted_at))
        .bind(s.status_text.clone())
        .bind(s.language.clone())
        .bind(s.runtime_ms.map(i64::from))
        .bind(s.memory_mb)
        .bind(s.code.clone())
        .execute(&self.pool)
        .await
        .context("insert submission")?;

        Ok(res.rows_affected() == 1)
    }

    async fn fetch_by_session(&self, session_id: &Uuid) -> anyhow::Result<Option<Submission>> {
        let row = sqlx::query(
            r#"
SELECT
  submission_id, external_id, session_id, user_id, problem_slug,
  submitted_ms, status_text, language,
  runtime_ms, memory_mb, code
FROM submissions
WHERE session_id = ?;
"#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_submission(&r)?)),
            None => Ok(None),
        }
    }
}

fn row_to_submission(r: &sqlx::any::AnyRow) -> anyhow::Result<Submission> {
    let id: String = r.try_get("submission_id")?;
    let session: String = r.try_get("session_id")?;
    let runtime: Option<i64> = r.try_get("runtime_ms")?;

    Ok(Submission {
        submission_id: parse_uuid(&id, "submission_id")?,
        external_id: r.try_get("external_id")?,
        session_id: parse_uuid(&session, "session_id")?,
        user_id: r.try_get("user_id")?,
        problem_slug: r.try_get("problem_slug")?,
        submitted_at: from_ms(r.try_get("submitted_ms")?)?,
        status_text: r.try_get("status_text")?,
        language: r.try_get("language")?,
        runtime_ms: runtime.map(i64_to_u32).transpose()?,
        memory_mb: r.try_get("memory_mb")?,
        code: r.try_get("code")?,
    })
}
