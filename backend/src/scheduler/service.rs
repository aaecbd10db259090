use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::card::model::{Card, DueCard};
use crate::card::repository::CardRepository;
use crate::catalog::ProblemCatalog;
use crate::error::AppError;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::quality::{Quality, quality_from_score};
use crate::scheduler::sm2;
use crate::time::day_of;

/// Compare-and-set rounds per review. A round only fails when another
/// review of the same card landed, so this covers that many concurrent reviewers.
const REVIEW_ATTEMPTS: usize = 8;

/// Card-facing scheduling operations: lazy creation, reviews, due queries.
pub struct ReviewService {
    cards: Arc<dyn CardRepository>,
    catalog: Arc<dyn ProblemCatalog>,
    counters: Counters,
}

impl ReviewService {
    pub fn new(
        cards: Arc<dyn CardRepository>,
        catalog: Arc<dyn ProblemCatalog>,
        counters: Counters,
    ) -> Self {
        Self {
            cards,
            catalog,
            counters,
        }
    }

    /// Returns the stored card, creating a default one due `today` if absent.
    /// Creation requires the problem to exist in the catalog.
    #[instrument(skip(self), target = "review")]
    pub async fn get_or_create(
        &self,
        user_id: &str,
        problem_slug: &str,
        today: NaiveDate,
    ) -> Result<Card, AppError> {
        if let Some(card) = self.cards.fetch_by_key(user_id, problem_slug).await? {
            return Ok(card);
        }

        if !self.catalog.contains(problem_slug).await? {
            return Err(AppError::not_found("problem", problem_slug));
        }

        debug!("no card yet; creating default");
        let card = self
            .cards
            .insert_if_absent(&Card::new(user_id, problem_slug, today))
            .await?;
        Ok(card)
    }

    /// Manual review with a raw grade. Out-of-range grades are rejected
    /// before any card is touched.
    pub async fn review(
        &self,
        user_id: &str,
        problem_slug: &str,
        quality: i64,
        now: DateTime<Utc>,
    ) -> Result<Card, AppError> {
        let quality = Quality::try_from(quality)?;
        self.apply(user_id, problem_slug, quality, now).await
    }

    /// Review driven by an evaluation score (0-100, or missing).
    pub async fn review_with_score(
        &self,
        user_id: &str,
        problem_slug: &str,
        score: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Card, AppError> {
        if let Some(s) = score.filter(|s| *s > 100) {
            return Err(AppError::InvalidInput(format!(
                "score must be between 0 and 100, got {s}"
            )));
        }
        self.apply(user_id, problem_slug, quality_from_score(score), now)
            .await
    }

    #[instrument(skip(self, quality, now), target = "review", fields(quality = %quality))]
    async fn apply(
        &self,
        user_id: &str,
        problem_slug: &str,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<Card, AppError> {
        let mut card = self.get_or_create(user_id, problem_slug, day_of(now)).await?;

        let mut attempt = 0;
        let updated = loop {
            attempt += 1;
            let next = sm2::review(&card, quality, now);

            let written = warn_if_slow("db_update_card", Duration::from_millis(50), async {
                self.cards.update_if_unchanged(&card, &next).await
            })
            .await?;
            if written {
                break next;
            }

            if attempt >= REVIEW_ATTEMPTS {
                return Err(AppError::Storage(anyhow::anyhow!(
                    "card {user_id}/{problem_slug} kept changing during review"
                )));
            }
            warn!(attempt, "card changed concurrently; reviewing latest state");
            card = self
                .cards
                .fetch_by_key(user_id, problem_slug)
                .await?
                .ok_or_else(|| AppError::not_found("card", problem_slug))?;
        };

        Counters::bump(&self.counters.cards_reviewed);
        info!(
            interval_days = updated.interval_days,
            repetitions = updated.repetitions,
            ease_factor = updated.ease_factor,
            next_review = %updated.next_review_date,
            "card reviewed"
        );

        Ok(updated)
    }

    /// Daily recommendations: cards due on or before `today`, oldest first.
    #[instrument(skip(self), target = "review")]
    pub async fn due_cards(&self, user_id: &str, today: NaiveDate) -> Result<Vec<DueCard>, AppError> {
        let cards = self.cards.fetch_due(user_id, today).await?;
        Ok(cards.into_iter().map(|c| DueCard::at(c, today)).collect())
    }

    pub async fn count_due(&self, user_id: &str, today: NaiveDate) -> Result<usize, AppError> {
        Ok(self.cards.fetch_due(user_id, today).await?.len())
    }

    pub async fn all_cards(&self, user_id: &str) -> Result<Vec<Card>, AppError> {
        Ok(self.cards.fetch_all(user_id).await?)
    }
}
