use chrono::{DateTime, NaiveDate, Utc};

use crate::quality::Quality;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Spaced-repetition state for one (user, problem) pair.
///
/// Only the most recent review is retained.
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub user_id: String,
    pub problem_slug: String,

    /// Interval growth multiplier. Never below `MIN_EASE_FACTOR`.
    pub ease_factor: f64,
    /// Days until the next review. Never below 1.
    pub interval_days: u32,
    /// Consecutive successful reviews.
    pub repetitions: u32,

    pub next_review_date: NaiveDate,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_quality: Option<Quality>,
}

impl Card {
    /// A never-reviewed card, due on `today`.
    pub fn new(user_id: impl Into<String>, problem_slug: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            problem_slug: problem_slug.into(),
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            repetitions: 0,
            next_review_date: today,
            last_reviewed_at: None,
            last_quality: None,
        }
    }

    /// Due on or after the scheduled day.
    pub fn is_due(&self, date: NaiveDate) -> bool {
        date >= self.next_review_date
    }

    pub fn is_overdue(&self, date: NaiveDate) -> bool {
        date > self.next_review_date
    }
}

/// A due card as presented in the daily recommendation list.
#[derive(Clone, Debug, PartialEq)]
pub struct DueCard {
    pub card: Card,
    pub days_since_last_review: Option<i64>,
    pub is_overdue: bool,
}

impl DueCard {
    pub fn at(card: Card, today: NaiveDate) -> Self {
        let days_since_last_review = card
            .last_reviewed_at
            .map(|ts| (today - ts.date_naive()).num_days());
        let is_overdue = card.is_overdue(today);

        Self {
            card,
            days_since_last_review,
            is_overdue,
        }
    }
}
