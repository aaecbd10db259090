use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::session::model::Session;
use crate::session::repository::SessionRepository;

/// In-process session store. Check-then-act runs under a single lock,
/// which stands in for the unique active-session index.
#[derive(Default)]
pub struct InMemorySessionRepository {
    map: Mutex<HashMap<Uuid, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw insert, bypassing the active-pair check. Lets tests seed
    /// states the normal path never produces.
    pub fn insert_unchecked(&self, session: Session) {
        self.map.lock().insert(session.session_id, session);
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn oldest_first(mut v: Vec<Session>) -> Vec<Session> {
    v.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    v
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn fetch_by_id_and_user(&self, session_id: &Uuid, user_id: &str) -> Result<Option<Session>> {
        Ok(self
            .map
            .lock()
            .get(session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let v = self
            .map
            .lock()
            .values()
            .filter(|s| s.user_id == user_id && s.is_active())
            .cloned()
            .collect();
        Ok(oldest_first(v))
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>> {
        let v = self
            .map
            .lock()
            .values()
            .filter(|s| s.is_stale(cutoff))
            .cloned()
            .collect();
        Ok(oldest_first(v))
    }

    async fn create_active(&self, session: &Session) -> Result<(Session, bool)> {
        let mut map = self.map.lock();

        let existing = map
            .values()
            .filter(|s| {
                s.is_active() && s.user_id == session.user_id && s.problem_slug == session.problem_slug
            })
            .min_by(|a, b| {
                a.started_at
                    .cmp(&b.started_at)
                    .then_with(|| a.session_id.cmp(&b.session_id))
            })
            .cloned();

        if let Some(active) = existing {
            return Ok((active, false));
        }

        map.insert(session.session_id, session.clone());
        Ok((session.clone(), true))
    }

    async fn finish_if_active(&self, session: &Session) -> Result<bool> {
        let mut map = self.map.lock();
        match map.get_mut(&session.session_id) {
            Some(stored) if stored.is_active() => {
                *stored = session.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
