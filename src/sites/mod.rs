//! Site listing, ordering, and selection.
//!
//! A site is a content tenant a user may have access to. The directory
//! (see [`directory`]) answers "which sites can this user see"; everything
//! else here is the ordering/filtering/selection policy on top of it:
//!
//! - the reserved system site is never exposed,
//! - archived sites are hidden unless explicitly requested,
//! - listings are sorted by name, case-insensitively,
//! - the "selected" site follows the session when still valid, otherwise
//!   falls back to the first site of the listing.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod directory;

pub use directory::{PgSiteDirectory, SiteDirectory};

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub archived: bool,
    #[serde(skip)]
    pub system: bool,
}

/// Query surface over a user's accessible sites.
///
/// Holds the access directory explicitly; handlers receive a clone via
/// request extensions.
#[derive(Clone)]
pub struct SiteBrowser {
    directory: Arc<dyn SiteDirectory>,
}

impl SiteBrowser {
    #[must_use]
    pub fn new(directory: Arc<dyn SiteDirectory>) -> Self {
        Self { directory }
    }

    /// List the sites the user has access to, ordered by name.
    ///
    /// The system site is always excluded. Archived sites are excluded
    /// unless `include_archived` is set. `name_prefix` keeps only sites
    /// whose name starts with it, case-insensitively; the empty prefix
    /// matches all. Directory errors are propagated unchanged.
    ///
    /// # Errors
    /// Returns an error if the directory lookup fails.
    pub async fn ordered_sites(
        &self,
        user_id: Uuid,
        include_archived: bool,
        name_prefix: &str,
    ) -> Result<Vec<Site>> {
        let all = self.directory.find_all(user_id).await?;
        Ok(ordered_sites(all, include_archived, name_prefix))
    }

    /// Look a site id up among the user's accessible sites.
    ///
    /// Archived sites are always included here; a switch to an archived
    /// site is legitimate. The system site is never found.
    ///
    /// # Errors
    /// Returns an error if the directory lookup fails.
    pub async fn find_site(&self, user_id: Uuid, site_id: &str) -> Result<Option<Site>> {
        let all = self.directory.find_all(user_id).await?;
        Ok(all
            .into_iter()
            .find(|site| !site.system && site.id == site_id))
    }
}

fn ordered_sites(all: Vec<Site>, include_archived: bool, name_prefix: &str) -> Vec<Site> {
    let prefix = name_prefix.to_lowercase();
    let mut sites: Vec<Site> = all
        .into_iter()
        .filter(|site| {
            !site.system
                && (include_archived || !site.archived)
                && site.name.to_lowercase().starts_with(&prefix)
        })
        .collect();
    sites.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    sites
}

/// Determine which site id is to be marked as selected.
///
/// When the session's site is still part of the listing it wins; otherwise
/// the first site of the listing. An empty listing yields the session value
/// as-is (the empty string when nothing was ever selected).
#[must_use]
pub fn selected_site_id(sites: &[Site], session_site_id: &str) -> String {
    if sites.iter().any(|site| site.id == session_site_id) {
        return session_site_id.to_string();
    }
    sites
        .first()
        .map_or_else(|| session_site_id.to_string(), |site| site.id.clone())
}
