use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub sessions_started: Arc<AtomicU64>,
    pub sessions_resumed: Arc<AtomicU64>,
    pub sessions_completed: Arc<AtomicU64>,
    pub sessions_abandoned: Arc<AtomicU64>,
    pub sessions_swept: Arc<AtomicU64>,

    pub reconcile_polls: Arc<AtomicU64>,
    pub reconcile_matched: Arc<AtomicU64>,

    // no-submission reasons
    pub reconcile_duplicate_skips: Arc<AtomicU64>,
    pub reconcile_lost_races: Arc<AtomicU64>,
    pub judge_unavailable: Arc<AtomicU64>,
    pub judge_timeouts: Arc<AtomicU64>,
    pub judge_missing_credentials: Arc<AtomicU64>,

    pub cards_reviewed: Arc<AtomicU64>,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
