//! Access directory: which sites can a user see.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::Site;

/// Site access lookup, backed by whatever records grants.
///
/// The directory returns every site granted to the user, including archived
/// ones and the system site; policy (archival gating, system-site
/// exclusion, ordering) lives in [`super::SiteBrowser`].
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// All sites the user has been granted access to.
    async fn find_all(&self, user_id: Uuid) -> Result<Vec<Site>>;
}

/// Postgres-backed directory over `sites` and `site_grants`.
#[derive(Clone)]
pub struct PgSiteDirectory {
    pool: PgPool,
}

impl PgSiteDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SiteDirectory for PgSiteDirectory {
    async fn find_all(&self, user_id: Uuid) -> Result<Vec<Site>> {
        let query = r"
            SELECT s.id, s.name, s.archived, s.is_system
            FROM sites s
            JOIN site_grants g ON g.site_id = s.id
            WHERE g.user_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list site grants")?;

        Ok(rows
            .into_iter()
            .map(|row| Site {
                id: row.get("id"),
                name: row.get("name"),
                archived: row.get("archived"),
                system: row.get("is_system"),
            })
            .collect())
    }
}
