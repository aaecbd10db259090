use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{AnyPool, Row};

use crate::card::model::Card;
use crate::card::repository::CardRepository;
use crate::db::convert::{
    date_to_text, i64_to_u32, opt_ms_to_ts, opt_ts_to_ms, quality_from_column, quality_to_column,
    text_to_date,
};

/// SQLx-backed implementation of CardRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxCardRepository {
    pool: AnyPool,
}

impl SqlxCardRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

const CARD_COLUMNS: &str = r#"
  user_id, problem_slug,
  ease_factor, interval_days, repetitions,
  next_review_date, last_reviewed_ms, last_quality
"#;

#[async_trait]
impl CardRepository for SqlxCardRepository {
    async fn fetch_by_key(
        &self,
        user_id: &str,
        problem_slug: &str,
    ) -> anyhow::Result<Option<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = ? AND problem_slug = ?;"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(problem_slug.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_card(&r)?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(&self, card: &Card) -> anyhow::Result<Card> {
        sqlx::query(
            r#"
INSERT INTO cards (
  user_id, problem_slug,
  ease_factor, interval_days, repetitions,
  next_review_date, last_reviewed_ms, last_quality
) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (user_id, problem_slug) DO NOTHING;
"#,
        )
        .bind(card.user_id.clone())
        .bind(card.problem_slug.clone())
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(i64::from(card.repetitions))
        .bind(date_to_text(card.next_review_date))
        .bind(opt_ts_to_ms(card.last_reviewed_at))
        .bind(quality_to_column(card.last_quality))
        .execute(&self.pool)
        .await
        .context("insert card")?;

        self.fetch_by_key(&card.user_id, &card.problem_slug)
            .await?
            .ok_or_else(|| anyhow::anyhow!("card vanished after insert: {}", card.problem_slug))
    }

    async fn upsert(&self, card: &Card) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO cards (
  user_id, problem_slug,
  ease_factor, interval_days, repetitions,
  next_review_date, last_reviewed_ms, last_quality
) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (user_id, problem_slug) DO UPDATE SET
  ease_factor = excluded.ease_factor,
  interval_days = excluded.interval_days,
  repetitions = excluded.repetitions,
  next_review_date = excluded.next_review_date,
  last_reviewed_ms = excluded.last_reviewed_ms,
  last_quality = excluded.last_quality;
"#,
        )
        .bind(card.user_id.clone())
        .bind(card.problem_slug.clone())
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(i64::from(card.repetitions))
        .bind(date_to_text(card.next_review_date))
        .bind(opt_ts_to_ms(card.last_reviewed_at))
        .bind(quality_to_column(card.last_quality))
        .execute(&self.pool)
        .await
        .context("upsert card")?;

        Ok(())
    }

    async fn update_if_unchanged(&self, prev: &Card, next: &Card) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
UPDATE cards
SET ease_factor = ?, interval_days = ?, repetitions = ?,
    next_review_date = ?, last_reviewed_ms = ?, last_quality = ?
WHERE user_id = ? AND problem_slug = ?
  AND ease_factor = ? AND interval_days = ? AND repetitions = ?
  AND COALESCE(last_reviewed_ms, -1) = ?;
"#,
        )
        .bind(next.ease_factor)
        .bind(i64::from(next.interval_days))
        .bind(i64::from(next.repetitions))
        .bind(date_to_text(next.next_review_date))
        .bind(opt_ts_to_ms(next.last_reviewed_at))
        .bind(quality_to_column(next.last_quality))
        .bind(prev.user_id.clone())
        .bind(prev.problem_slug.clone())
        .bind(prev.ease_factor)
        .bind(i64::from(prev.interval_days))
        .bind(i64::from(prev.repetitions))
        .bind(opt_ts_to_ms(prev.last_reviewed_at).unwrap_or(-1))
        .execute(&self.pool)
        .await
        .context("compare-and-set card")?;

        Ok(res.rows_affected() == 1)
    }

    async fn fetch_due(&self, user_id: &str, date: NaiveDate) -> anyhow::Result<Vec<Card>> {
        // ISO-8601 dates order lexicographically.
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards \
             WHERE user_id = ? AND next_review_date <= ? \
             ORDER BY next_review_date ASC, problem_slug ASC;"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .bind(date_to_text(date))
            .fetch_all(&self.pool)
            .await?;

        collect_cards(rows)
    }

    async fn fetch_all(&self, user_id: &str) -> anyhow::Result<Vec<Card>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards \
             WHERE user_id = ? \
             ORDER BY next_review_date ASC, problem_slug ASC;"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        collect_cards(rows)
    }
}

fn collect_cards(rows: Vec<sqlx::any::AnyRow>) -> anyhow::Result<Vec<Card>> {
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        match row_to_card(&r) {
            Ok(c) => out.push(c),
            Err(e) => {
                // poison-row resilience: skip but don't fail the listing
                tracing::warn!(error = %e, "skipping malformed card row");
            }
        }
    }
    Ok(out)
}

fn row_to_card(r: &sqlx::any::AnyRow) -> anyhow::Result<Card> {
    let next_review: String = r.try_get("next_review_date")?;

    Ok(Card {
        user_id: r.try_get("user_id")?,
        problem_slug: r.try_get("problem_slug")?,
        ease_factor: r.try_get::<f64, _>("ease_factor")?,
        interval_days: i64_to_u32(r.try_get("interval_days")?)?,
        repetitions: i64_to_u32(r.try_get("repetitions")?)?,
        next_review_date: text_to_date(&next_review)?,
        last_reviewed_at: opt_ms_to_ts(r.try_get("last_reviewed_ms")?)?,
        last_quality: quality_from_column(r.try_get("last_quality")?)?,
    })
}
