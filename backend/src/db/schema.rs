use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Cards: one per (user, problem)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS cards (
  user_id TEXT NOT NULL,
  problem_slug TEXT NOT NULL,
  ease_factor REAL NOT NULL CHECK (ease_factor >= 1.3),
  interval_days BIGINT NOT NULL CHECK (interval_days >= 1),
  repetitions BIGINT NOT NULL CHECK (repetitions >= 0),
  next_review_date TEXT NOT NULL,
  last_reviewed_ms BIGINT,
  last_quality BIGINT CHECK (last_quality BETWEEN 0 AND 5),
  PRIMARY KEY (user_id, problem_slug)
);
"#,
    )
    .execute(pool)
    .await?;

    // Sessions
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS sessions (
  session_id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  problem_slug TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('ACTIVE', 'COMPLETED', 'ABANDONED')),
  started_ms BIGINT NOT NULL,
  completed_ms BIGINT,
  elapsed_secs BIGINT,
  submission_id TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Submissions: unique per judge event and per session
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS submissions (
  submission_id TEXT PRIMARY KEY,
  external_id TEXT NOT NULL UNIQUE,
  session_id TEXT NOT NULL UNIQUE,
  user_id TEXT NOT NULL,
  problem_slug TEXT NOT NULL,
  submitted_ms BIGINT NOT NULL,
  status_text TEXT NOT NULL,
  language TEXT NOT NULL,
  runtime_ms BIGINT,
  memory_mb REAL,
  code TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Per-problem progress
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS user_progress (
  user_id TEXT NOT NULL,
  problem_slug TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('NOT_STARTED', 'IN_PROGRESS', 'COMPLETED')),
  attempt_count BIGINT NOT NULL DEFAULT 0,
  last_attempted_ms BIGINT,
  completed_ms BIGINT,
  PRIMARY KEY (user_id, problem_slug)
);
"#,
    )
    .execute(pool)
    .await?;

    // At most one ACTIVE session per (user, problem).
    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS uq_sessions_active_pair ON sessions(user_id, problem_slug) WHERE status = 'ACTIVE';"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_sessions_status_started ON sessions(status, started_ms);"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(user_id, next_review_date);"#)
        .execute(pool)
        .await?;

    Ok(())
}
