//! Site browser endpoints.
//!
//! Flow overview:
//! 1) Authenticate the request via session cookie or bearer token.
//! 2) List the user's accessible sites through the injected [`SiteBrowser`].
//! 3) Resolve or mutate the per-session site selection.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::require_session;
use crate::i18n;
use crate::session::SessionStore;
use crate::sites::{selected_site_id, Site, SiteBrowser};

/// Legacy wildcard suffix on the filter path segment; `*` alone means "no
/// filter".
const NO_FILTER: &str = "*";

#[derive(ToSchema, Serialize, Debug)]
pub struct CurrentSiteResponse {
    pub sites: Vec<Site>,
    #[serde(rename = "currentSite")]
    pub current_site: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct FilteredSitesResponse {
    pub result: Vec<Site>,
    pub messages: HashMap<String, String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SwitchSiteResponse {
    #[serde(rename = "hostSwitched")]
    pub host_switched: bool,
}

#[utoipa::path(
    get,
    path = "/v1/site/currentSite",
    responses(
        (status = 200, description = "Accessible sites and the selected one", body = CurrentSiteResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Unexpected error"),
    ),
    tag = "site"
)]
pub async fn current_site(
    headers: HeaderMap,
    Extension(sessions): Extension<Arc<dyn SessionStore>>,
    Extension(browser): Extension<SiteBrowser>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &sessions).await {
        Ok(session) => session,
        Err(status) => return status.into_response(),
    };

    match browser.ordered_sites(session.user_id, false, "").await {
        Ok(sites) => {
            let current_site =
                selected_site_id(&sites, session.selected_site_id.as_deref().unwrap_or(""));
            (
                StatusCode::OK,
                Json(CurrentSiteResponse {
                    sites,
                    current_site,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to list sites: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/site/filter/{filter}/archived/{archived}",
    params(
        ("filter" = String, Path, description = "Name prefix; `*` matches all"),
        ("archived" = bool, Path, description = "Include archived sites")
    ),
    responses(
        (status = 200, description = "Filtered site listing", body = FilteredSitesResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 500, description = "Unexpected error"),
    ),
    tag = "site"
)]
pub async fn filter_sites(
    headers: HeaderMap,
    Path((filter, archived)): Path<(String, bool)>,
    Extension(sessions): Extension<Arc<dyn SessionStore>>,
    Extension(browser): Extension<SiteBrowser>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &sessions).await {
        Ok(session) => session,
        Err(status) => return status.into_response(),
    };

    let filter = filter
        .strip_suffix(NO_FILTER)
        .unwrap_or(filter.as_str());

    match browser
        .ordered_sites(session.user_id, archived, filter)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(FilteredSitesResponse {
                result,
                messages: i18n::messages_map(i18n::SITE_SELECTOR_KEYS),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to filter sites: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/v1/site/switch/{id}",
    params(
        ("id" = String, Path, description = "Site id to select")
    ),
    responses(
        (status = 200, description = "Selection updated", body = SwitchSiteResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "Site is not accessible to the user"),
        (status = 500, description = "Unexpected error"),
    ),
    tag = "site"
)]
pub async fn switch_site(
    headers: HeaderMap,
    Path(id): Path<String>,
    Extension(sessions): Extension<Arc<dyn SessionStore>>,
    Extension(browser): Extension<SiteBrowser>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &sessions).await {
        Ok(session) => session,
        Err(status) => return status.into_response(),
    };

    let id = id.trim();
    if id.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }

    // The requested id must be one of the user's sites; archived sites are
    // a legitimate switch target.
    let site = match browser.find_site(session.user_id, id).await {
        Ok(site) => site,
        Err(err) => {
            error!("Failed to look up site {id}: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if site.is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match sessions.select_site(&session.token_hash, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SwitchSiteResponse {
                host_switched: true,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to persist site selection: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
