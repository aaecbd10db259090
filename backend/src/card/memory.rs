use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::card::model::Card;
use crate::card::repository::CardRepository;

type Key = (String, String);

/// In-process card store. The (user, problem) key is unique by construction.
#[derive(Default)]
pub struct InMemoryCardRepository {
    map: Mutex<HashMap<Key, Card>>,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut cards: Vec<Card>) -> Vec<Card> {
        cards.sort_by(|a, b| {
            a.next_review_date
                .cmp(&b.next_review_date)
                .then_with(|| a.problem_slug.cmp(&b.problem_slug))
        });
        cards
    }
}

fn key(user_id: &str, problem_slug: &str) -> Key {
    (user_id.to_string(), problem_slug.to_string())
}

#[async_trait]
impl CardRepository for InMemoryCardRepository {
    async fn fetch_by_key(&self, user_id: &str, problem_slug: &str) -> Result<Option<Card>> {
        Ok(self.map.lock().get(&key(user_id, problem_slug)).cloned())
    }

    async fn insert_if_absent(&self, card: &Card) -> Result<Card> {
        let mut map = self.map.lock();
        let stored = map
            .entry(key(&card.user_id, &card.problem_slug))
            .or_insert_with(|| card.clone());
        Ok(stored.clone())
    }

    async fn upsert(&self, card: &Card) -> Result<()> {
        self.map
            .lock()
            .insert(key(&card.user_id, &card.problem_slug), card.clone());
        Ok(())
    }

    async fn update_if_unchanged(&self, prev: &Card, next: &Card) -> Result<bool> {
        let mut map = self.map.lock();
        match map.get_mut(&key(&prev.user_id, &prev.problem_slug)) {
            Some(stored) if stored == prev => {
                *stored = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fetch_due(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Card>> {
        let due = self
            .map
            .lock()
            .values()
            .filter(|c| c.user_id == user_id && c.is_due(date))
            .cloned()
            .collect();
        Ok(Self::sorted(due))
    }

    async fn fetch_all(&self, user_id: &str) -> Result<Vec<Card>> {
        let all = self
            .map
            .lock()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::sorted(all))
    }
}
