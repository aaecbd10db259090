use std::str::FromStr;
use std::time::Duration;

use crate::sweep::StalePolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Pool size for the sqlx `Any` pool.
    pub database_max_connections: u32,

    // =========================
    // Judge configuration
    // =========================
    /// GraphQL endpoint of the external judge.
    pub judge_graphql_url: String,

    /// Upper bound on a single judge call.
    ///
    /// A poll that exceeds this is reported as "no submission yet";
    /// the caller simply polls again later.
    pub judge_timeout: Duration,

    /// Number of most recent judge events inspected per poll (K).
    ///
    /// Too low => a burst of unrelated submissions can hide the
    /// matching one until the next poll.
    pub judge_recent_limit: usize,

    // =========================
    // Stale session sweep
    // =========================
    /// Sessions ACTIVE for longer than this are considered stale.
    pub stale_session_after: Duration,

    /// Cadence of the sweep timer owned by the binary.
    pub stale_sweep_interval: Duration,

    /// What the sweep does with a stale session.
    pub stale_policy: StalePolicy,

    /// Problem slugs accepted by `start`. Comma separated in the environment.
    pub problem_slugs: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://lanki_dev.db?mode=rwc".to_string());

        let judge_graphql_url = std::env::var("JUDGE_GRAPHQL_URL")
            .unwrap_or_else(|_| "https://leetcode.com/graphql".to_string());

        Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 16),
            judge_graphql_url,

            judge_timeout: Duration::from_millis(env_or("JUDGE_TIMEOUT_MS", 10_000)),
            judge_recent_limit: env_or("JUDGE_RECENT_LIMIT", 5usize).max(1),

            // Two hours of inactivity before a session is swept.
            stale_session_after: Duration::from_secs(env_or("STALE_SESSION_AFTER_SECS", 7_200)),
            stale_sweep_interval: Duration::from_secs(env_or("STALE_SWEEP_INTERVAL_SECS", 300)),
            stale_policy: env_or("STALE_SESSION_POLICY", StalePolicy::Abandon),

            problem_slugs: std::env::var("PROBLEM_SLUGS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "unparseable config value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_when_unset() {
        let v: u64 = env_or("LANKI_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(v, 42);
    }

    #[test]
    fn stale_policy_parses_case_insensitively() {
        assert_eq!("Abandon".parse::<StalePolicy>().unwrap(), StalePolicy::Abandon);
        assert_eq!("report".parse::<StalePolicy>().unwrap(), StalePolicy::ReportOnly);
        assert!("complete".parse::<StalePolicy>().is_err());
    }

    #[test]
    fn slug_list_skips_blanks() {
        assert_eq!(split_list(" two-sum, ,lru-cache,"), vec!["two-sum", "lru-cache"]);
    }
}
