pub mod convert;
pub mod schema;

use std::time::Duration;

use anyhow::Context;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

/// Connection handle shared by every SQLx repository.
#[derive(Clone)]
pub struct Db {
    pub pool: AnyPool,
}

impl Db {
    /// Opens a pool on any sqlx-supported URL (sqlite or postgres).
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .with_context(|| format!("connect to {}", redact_url(database_url)))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        schema::migrate(&self.pool).await.context("migrate schema")
    }
}

/// Drops the userinfo part so credentials never reach the logs.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(
            redact_url("postgres://lanki:hunter2@db:5432/lanki"),
            "postgres://***@db:5432/lanki"
        );
        assert_eq!(redact_url("sqlite://lanki_dev.db?mode=rwc"), "sqlite://lanki_dev.db?mode=rwc");
    }
}
