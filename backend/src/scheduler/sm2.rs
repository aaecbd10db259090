//! SM-2 review transition.
//!
//! The ease update keeps a fixed operand order and intervals round half
//! away from zero (`f64::round`); both are observable in stored schedules.

use chrono::{DateTime, Days, Utc};

use crate::card::model::{Card, MIN_EASE_FACTOR};
use crate::quality::Quality;
use crate::time::day_of;

/// Applies one review of `quality` at `now` and returns the updated card.
pub fn review(card: &Card, quality: Quality, now: DateTime<Utc>) -> Card {
    let mut next = card.clone();
    let q = quality.value();

    if quality.is_pass() {
        next.interval_days = match card.repetitions {
            0 => 1,
            1 => 6,
            _ => next_interval(card.interval_days, card.ease_factor),
        };
        next.repetitions = card.repetitions.saturating_add(1);
    } else {
        next.repetitions = 0;
        next.interval_days = 1;
    }

    next.ease_factor = next_ease_factor(card.ease_factor, q);
    next.next_review_date = day_of(now)
        .checked_add_days(Days::new(u64::from(next.interval_days)))
        .unwrap_or(chrono::NaiveDate::MAX);
    next.last_reviewed_at = Some(now);
    next.last_quality = Some(quality);

    next
}

fn next_interval(interval_days: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(interval_days) * ease_factor).round();
    if grown >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        grown as u32
    }
}

fn next_ease_factor(ease_factor: f64, q: u8) -> f64 {
    let miss = f64::from(5 - q);
    let ef = ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
    if ef < MIN_EASE_FACTOR { MIN_EASE_FACTOR } else { ef }
}
