use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::submission::model::Submission;
use crate::submission::repository::SubmissionRepository;

#[derive(Default)]
struct Tables {
    by_external: HashMap<String, Submission>,
    by_session: HashMap<Uuid, String>,
}

/// In-process submission store. Both uniqueness checks and the insert
/// happen under one lock.
#[derive(Default)]
pub struct InMemorySubmissionRepository {
    tables: Mutex<Tables>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().by_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionRepository {
    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool> {
        Ok(self.tables.lock().by_external.contains_key(external_id))
    }

    async fn insert_if_absent(&self, submission: &Submission) -> Result<bool> {
        let mut t = self.tables.lock();
        if t.by_external.contains_key(&submission.external_id)
            || t.by_session.contains_key(&submission.session_id)
        {
            return Ok(false);
        }

        t.by_session
            .insert(submission.session_id, submission.external_id.clone());
        t.by_external
            .insert(submission.external_id.clone(), submission.clone());
        Ok(true)
    }

    async fn fetch_by_session(&self, session_id: &Uuid) -> Result<Option<Submission>> {
        let t = self.tables.lock();
        Ok(t.by_session
            .get(session_id)
            .and_then(|ext| t.by_external.get(ext))
            .cloned())
    }
}
