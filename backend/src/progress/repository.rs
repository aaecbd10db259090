use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::progress::model::Progress;

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn fetch(&self, user_id: &str, problem_slug: &str) -> Result<Option<Progress>>;

    async fn mark_in_progress(&self, user_id: &str, problem_slug: &str, now: DateTime<Utc>) -> Result<()>;

    async fn mark_completed(&self, user_id: &str, problem_slug: &str, now: DateTime<Utc>) -> Result<()>;
}
