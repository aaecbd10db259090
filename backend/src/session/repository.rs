use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::session::model::Session;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn fetch_by_id_and_user(&self, session_id: &Uuid, user_id: &str) -> Result<Option<Session>>;

    /// ACTIVE sessions of a user, oldest first.
    async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// ACTIVE sessions started strictly before `cutoff`, oldest first.
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>>;

    /// Atomically stores the ACTIVE `session` unless its (user, problem)
    /// pair already has an ACTIVE one.
    ///
    /// Returns the pair's ACTIVE session (earliest start wins) and whether
    /// `session` was the one written.
    async fn create_active(&self, session: &Session) -> Result<(Session, bool)>;

    /// Writes the terminal `session` only if the stored row is still ACTIVE.
    ///
    /// Returns `false` when the row had already left ACTIVE.
    async fn finish_if_active(&self, session: &Session) -> Result<bool>;
}
