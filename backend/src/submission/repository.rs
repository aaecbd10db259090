use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::submission::model::Submission;

/// Storage for submissions; doubles as the reconciler's dedup index.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool>;

    /// Atomically stores `submission` unless its external id is already
    /// recorded or its session already owns a submission.
    ///
    /// Returns `false` when nothing was written.
    async fn insert_if_absent(&self, submission: &Submission) -> Result<bool>;

    async fn fetch_by_session(&self, session_id: &Uuid) -> Result<Option<Submission>>;
}
