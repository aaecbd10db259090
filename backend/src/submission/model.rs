use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::judge::types::JudgeEvent;

pub const ACCEPTED: &str = "Accepted";

/// Immutable record of one judge event, attached to exactly one session.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub submission_id: Uuid,
    /// Judge-side identifier; the dedup key.
    pub external_id: String,
    pub session_id: Uuid,
    pub user_id: String,
    pub problem_slug: String,
    pub submitted_at: DateTime<Utc>,
    /// Judge verdict, e.g. "Accepted" or "Wrong Answer".
    pub status_text: String,
    pub language: String,

    pub runtime_ms: Option<u32>,
    pub memory_mb: Option<f64>,
    pub code: Option<String>,
}

impl Submission {
    /// Materializes a submission for `session_id` from a judge event.
    pub fn from_event(event: &JudgeEvent, session_id: Uuid, user_id: &str) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            external_id: event.external_id.clone(),
            session_id,
            user_id: user_id.to_string(),
            problem_slug: event.problem_slug.clone(),
            submitted_at: event.submitted_at,
            status_text: event.status_text.clone(),
            language: event.language.clone(),
            // The recent-events feed carries no runtime, memory or code.
            runtime_ms: None,
            memory_mb: None,
            code: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status_text == ACCEPTED
    }
}
