use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::progress::model::Progress;
use crate::progress::repository::ProgressRepository;

#[derive(Default)]
pub struct InMemoryProgressRepository {
    map: Mutex<HashMap<(String, String), Progress>>,
}

impl InMemoryProgressRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, user_id: &str, problem_slug: &str, f: impl FnOnce(Progress) -> Progress) {
        let mut map = self.map.lock();
        let key = (user_id.to_string(), problem_slug.to_string());
        let current = map
            .remove(&key)
            .unwrap_or_else(|| Progress::not_started(user_id, problem_slug));
        map.insert(key, f(current));
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn fetch(&self, user_id: &str, problem_slug: &str) -> Result<Option<Progress>> {
        Ok(self
            .map
            .lock()
            .get(&(user_id.to_string(), problem_slug.to_string()))
            .cloned())
    }

    async fn mark_in_progress(&self, user_id: &str, problem_slug: &str, now: DateTime<Utc>) -> Result<()> {
        self.update(user_id, problem_slug, |p| p.attempted(now));
        Ok(())
    }

    async fn mark_completed(&self, user_id: &str, problem_slug: &str, now: DateTime<Utc>) -> Result<()> {
        self.update(user_id, problem_slug, |p| p.completed(now));
        Ok(())
    }
}
