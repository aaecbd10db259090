use std::sync::Arc;
use std::time::Duration;

use lanki::{
    catalog::StaticCatalog,
    config::AppConfig,
    db::Db,
    judge::LeetCodeClient,
    logger::{init_tracing, root_span},
    metrics::counters::Counters,
    progress::repository_sqlx::SqlxProgressRepository,
    reconcile::Reconciler,
    session::{manager::SessionManager, repository_sqlx::SqlxSessionRepository},
    submission::repository_sqlx::SqlxSubmissionRepository,
    sweep::sweep_stale_sessions,
    time::now,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::Instrument;

/// Connects, migrates and wires the session manager on top of SQL storage.
async fn init_sessions(cfg: &AppConfig, counters: Counters) -> anyhow::Result<Arc<SessionManager>> {
    let db = Db::connect(&cfg.database_url, cfg.database_max_connections).await?;
    db.migrate().await?;

    let submissions = Arc::new(SqlxSubmissionRepository::new(db.pool.clone()));
    let judge = Arc::new(LeetCodeClient::new(
        cfg.judge_graphql_url.clone(),
        cfg.judge_timeout,
    )?);

    let reconciler = Reconciler::new(
        judge,
        submissions.clone(),
        cfg.judge_recent_limit,
        cfg.judge_timeout,
        counters.clone(),
    );

    if cfg.problem_slugs.is_empty() {
        tracing::warn!("PROBLEM_SLUGS is empty; every session start will be rejected");
    }

    Ok(Arc::new(SessionManager::new(
        Arc::new(SqlxSessionRepository::new(db.pool.clone())),
        submissions,
        Arc::new(SqlxProgressRepository::new(db.pool.clone())),
        Arc::new(StaticCatalog::from_slugs(cfg.problem_slugs.iter().cloned())),
        reconciler,
        counters,
    )))
}

/// Periodic stale-session sweep plus a counters snapshot.
fn start_sweep_loop(manager: Arc<SessionManager>, cfg: &AppConfig, counters: Counters) {
    let every = cfg.stale_sweep_interval.max(Duration::from_secs(1));
    let max_age = cfg.stale_session_after;
    let policy = cfg.stale_policy;

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let pass = sweep_stale_sessions(&manager, max_age, policy, now());
            if let Err(e) = pass.instrument(root_span("stale_sweep")).await {
                tracing::error!(error = %e, "stale sweep failed");
            }

            tracing::info!(
                target: "metrics",
                started = Counters::read(&counters.sessions_started),
                completed = Counters::read(&counters.sessions_completed),
                abandoned = Counters::read(&counters.sessions_abandoned),
                swept = Counters::read(&counters.sessions_swept),
                polls = Counters::read(&counters.reconcile_polls),
                judge_unavailable = Counters::read(&counters.judge_unavailable),
                judge_timeouts = Counters::read(&counters.judge_timeouts),
                "counters"
            );
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting lanki practice core...");

    let cfg = AppConfig::from_env();
    let counters = Counters::default();

    let manager = init_sessions(&cfg, counters.clone()).await?;
    start_sweep_loop(manager, &cfg, counters);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
