use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::card::model::Card;

#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn fetch_by_key(&self, user_id: &str, problem_slug: &str) -> Result<Option<Card>>;

    /// Inserts `card` unless one already exists for its (user, problem) pair.
    /// Returns the stored card either way.
    async fn insert_if_absent(&self, card: &Card) -> Result<Card>;

    async fn upsert(&self, card: &Card) -> Result<()>;

    /// Replaces the stored card with `next` only while it still equals
    /// `prev` in its scheduling state. `false` means a concurrent review won.
    async fn update_if_unchanged(&self, prev: &Card, next: &Card) -> Result<bool>;

    /// Cards with `next_review_date <= date`, ascending by `next_review_date`.
    async fn fetch_due(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Card>>;

    /// All of a user's cards, ascending by `next_review_date`.
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>>;
}
