use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

/// Problem catalog as seen by the session manager: existence only.
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn contains(&self, problem_slug: &str) -> Result<bool>;
}

/// Fixed set of known problem slugs.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    slugs: HashSet<String>,
}

impl StaticCatalog {
    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ProblemCatalog for StaticCatalog {
    async fn contains(&self, problem_slug: &str) -> Result<bool> {
        Ok(self.slugs.contains(problem_slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_catalog_knows_only_its_slugs() {
        let c = StaticCatalog::from_slugs(["two-sum", "lru-cache"]);
        assert!(c.contains("two-sum").await.unwrap());
        assert!(!c.contains("Two-Sum").await.unwrap());
        assert!(!StaticCatalog::default().contains("two-sum").await.unwrap());
    }
}
