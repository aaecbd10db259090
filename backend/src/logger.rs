use std::time::Duration;
use tracing::{Span, field};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

/// Installs the global subscriber. `RUST_LOG` overrides the default
/// filter; sqlx statement logging stays at warn unless asked for.
pub fn init_tracing(json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json().flatten_event(true)).init();
    } else {
        registry.with(layer.compact()).init();
    }
}

const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Span wrapping one externally triggered unit of work (a check, a sweep pass).
pub fn root_span(name: &'static str) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        user_id = field::Empty,
        session_id = field::Empty
    )
}

pub fn annotate_span(user_id: &str, session_id: Option<&Uuid>) {
    let span = Span::current();
    span.record("user_id", field::display(user_id));
    if let Some(sid) = session_id {
        span.record("session_id", field::display(sid));
    }
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
