//! Handler tests: the full router mounted over in-memory collaborators.

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE},
        Request, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use crate::api;
use crate::session::{hash_session_token, SessionRecord, SessionStore};
use crate::sites::{Site, SiteDirectory};
use crate::token::{self, ResetClaims, TokenKey};
use crate::users::{ResetPasswordError, UserStore};

const SESSION_TOKEN: &str = "test-session-token";
const USER_ID: &str = "0e3d6cbe-8cf3-4c8c-9a4c-0c1b49f2d1aa";

fn user_id() -> Uuid {
    Uuid::parse_str(USER_ID).expect("fixed uuid")
}

fn token_key() -> TokenKey {
    TokenKey::new(SecretString::from("test-secret".to_string()))
}

fn site(id: &str, name: &str, archived: bool, system: bool) -> Site {
    Site {
        id: id.to_string(),
        name: name.to_string(),
        archived,
        system,
    }
}

fn fixture_sites() -> Vec<Site> {
    vec![
        site("beta", "Beta.example.com", false, false),
        site("old", "old.example.com", true, false),
        site("SYSTEM_SITE", "system", false, true),
        site("alpha", "alpha.example.com", false, false),
    ]
}

struct MemorySiteDirectory {
    sites: Vec<Site>,
}

#[async_trait]
impl SiteDirectory for MemorySiteDirectory {
    async fn find_all(&self, _user_id: Uuid) -> Result<Vec<Site>> {
        Ok(self.sites.clone())
    }
}

struct MemorySessionStore {
    records: Mutex<HashMap<Vec<u8>, SessionRecord>>,
    last_search: Mutex<HashMap<Vec<u8>, String>>,
}

impl MemorySessionStore {
    fn with_selection(selected: Option<&str>) -> Arc<Self> {
        let token_hash = hash_session_token(SESSION_TOKEN);
        let record = SessionRecord {
            token_hash: token_hash.clone(),
            user_id: user_id(),
            email: "admin@example.com".to_string(),
            selected_site_id: selected.map(str::to_string),
        };
        let mut records = HashMap::new();
        records.insert(token_hash.clone(), record);
        let mut last_search = HashMap::new();
        last_search.insert(token_hash, "cached search".to_string());
        Arc::new(Self {
            records: Mutex::new(records),
            last_search: Mutex::new(last_search),
        })
    }

    async fn selected(&self) -> Option<String> {
        let records = self.records.lock().await;
        records
            .get(&hash_session_token(SESSION_TOKEN))
            .and_then(|record| record.selected_site_id.clone())
    }

    async fn cached_search(&self) -> Option<String> {
        let last_search = self.last_search.lock().await;
        last_search.get(&hash_session_token(SESSION_TOKEN)).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(token_hash).cloned())
    }

    async fn select_site(&self, token_hash: &[u8], site_id: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(token_hash) {
            record.selected_site_id = Some(site_id.to_string());
        }
        let mut last_search = self.last_search.lock().await;
        last_search.remove(token_hash);
        Ok(())
    }
}

enum ResetOutcome {
    Ok,
    NoSuchUser,
    InvalidToken,
    Expired,
}

struct MemoryUserStore {
    outcome: ResetOutcome,
    calls: Mutex<Vec<(Uuid, String)>>,
}

impl MemoryUserStore {
    fn with_outcome(outcome: ResetOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn reset_password(
        &self,
        user_id: Uuid,
        reset_token: &str,
        _new_password: &str,
        _now_unix_seconds: i64,
    ) -> Result<(), ResetPasswordError> {
        let mut calls = self.calls.lock().await;
        calls.push((user_id, reset_token.to_string()));
        match self.outcome {
            ResetOutcome::Ok => Ok(()),
            ResetOutcome::NoSuchUser => Err(ResetPasswordError::NoSuchUser),
            ResetOutcome::InvalidToken => Err(ResetPasswordError::InvalidToken),
            ResetOutcome::Expired => Err(ResetPasswordError::Expired),
        }
    }
}

fn test_app(
    sessions: Arc<MemorySessionStore>,
    users: Arc<MemoryUserStore>,
) -> Router {
    // Lazy pool: only the health endpoint touches it, and these tests don't.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/retejo_test")
        .expect("lazy pool");
    let directory: Arc<dyn SiteDirectory> = Arc::new(MemorySiteDirectory {
        sites: fixture_sites(),
    });
    api::app(pool, directory, sessions, users, token_key())
}

fn default_app(sessions: Arc<MemorySessionStore>) -> Router {
    test_app(sessions, MemoryUserStore::with_outcome(ResetOutcome::Ok))
}

fn get(uri: &str, with_session: bool) -> Request<Body> {
    let builder = Request::builder().method("GET").uri(uri);
    let builder = if with_session {
        builder.header(COOKIE, format!("retejo_session={SESSION_TOKEN}"))
    } else {
        builder
    };
    builder.body(Body::empty()).expect("request")
}

fn put(uri: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(COOKIE, format!("retejo_session={SESSION_TOKEN}"))
        .body(Body::empty())
        .expect("request")
}

fn post_reset(token: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/authentication/reset-password")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({"token": token, "password": password})).expect("body"),
        ))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn signed_reset_token(sub: &str, jti: &str) -> String {
    let now = token::now_unix_seconds();
    let claims = ResetClaims {
        iss: token::ISSUER.to_string(),
        sub: sub.to_string(),
        jti: jti.to_string(),
        iat: now,
        exp: now + 600,
    };
    token::sign(&token_key(), &claims).expect("sign")
}

fn message_key(body: &Value) -> &str {
    body["errors"][0]["messageKey"].as_str().unwrap_or("")
}

#[tokio::test]
async fn current_site_requires_a_session() {
    let app = default_app(MemorySessionStore::with_selection(None));
    let response = app
        .oneshot(get("/v1/site/currentSite", false))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_site_defaults_to_first_of_listing() {
    let app = default_app(MemorySessionStore::with_selection(None));
    let response = app
        .oneshot(get("/v1/site/currentSite", true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["currentSite"], "alpha");
    let names: Vec<&str> = body["sites"]
        .as_array()
        .expect("sites array")
        .iter()
        .map(|site| site["name"].as_str().expect("name"))
        .collect();
    // Sorted, no archived, no system site.
    assert_eq!(names, vec!["alpha.example.com", "Beta.example.com"]);
}

#[tokio::test]
async fn current_site_keeps_a_valid_session_selection() {
    let app = default_app(MemorySessionStore::with_selection(Some("beta")));
    let response = app
        .oneshot(get("/v1/site/currentSite", true))
        .await
        .expect("response");
    let body = body_json(response).await;
    assert_eq!(body["currentSite"], "beta");
}

#[tokio::test]
async fn current_site_falls_back_when_selection_went_stale() {
    // "old" is archived, so the default listing no longer carries it.
    let app = default_app(MemorySessionStore::with_selection(Some("old")));
    let response = app
        .oneshot(get("/v1/site/currentSite", true))
        .await
        .expect("response");
    let body = body_json(response).await;
    assert_eq!(body["currentSite"], "alpha");
}

#[tokio::test]
async fn filter_endpoint_applies_prefix_and_messages() {
    let app = default_app(MemorySessionStore::with_selection(None));
    let response = app
        .oneshot(get("/v1/site/filter/AL/archived/false", true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let result = body["result"].as_array().expect("result array");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["id"], "alpha");
    assert_eq!(body["messages"]["select-host"], "Select Site");
}

#[tokio::test]
async fn filter_wildcard_lists_everything_with_archived() {
    let app = default_app(MemorySessionStore::with_selection(None));
    let response = app
        .oneshot(get("/v1/site/filter/*/archived/true", true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let ids: Vec<&str> = body["result"]
        .as_array()
        .expect("result array")
        .iter()
        .map(|site| site["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec!["alpha", "beta", "old"]);
}

#[tokio::test]
async fn switch_to_inaccessible_site_is_not_found() {
    let sessions = MemorySessionStore::with_selection(Some("alpha"));
    let app = default_app(sessions.clone());
    let response = app
        .oneshot(put("/v1/site/switch/not-mine"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    // Selection must be untouched on a miss.
    assert_eq!(sessions.selected().await.as_deref(), Some("alpha"));
    assert!(sessions.cached_search().await.is_some());
}

#[tokio::test]
async fn switch_updates_selection_and_clears_last_search() {
    let sessions = MemorySessionStore::with_selection(Some("alpha"));
    let app = default_app(sessions.clone());
    let response = app
        .oneshot(put("/v1/site/switch/old"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["hostSwitched"], true);
    assert_eq!(sessions.selected().await.as_deref(), Some("old"));
    assert_eq!(sessions.cached_search().await, None);
}

#[tokio::test]
async fn reset_password_maps_unknown_user_to_bad_request() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::NoSuchUser);
    let app = test_app(MemorySessionStore::with_selection(None), users);
    let response = app
        .oneshot(post_reset(
            &signed_reset_token(USER_ID, "reset-token"),
            "longenough",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(message_key(&body), "please-enter-a-valid-login");
}

#[tokio::test]
async fn reset_password_maps_mismatched_token_to_bad_request() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::InvalidToken);
    let app = test_app(MemorySessionStore::with_selection(None), users);
    let response = app
        .oneshot(post_reset(
            &signed_reset_token(USER_ID, "reset-token"),
            "longenough",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(message_key(&body), "reset-password-token-invalid");
}

#[tokio::test]
async fn reset_password_maps_expired_token_to_unauthorized() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::Expired);
    let app = test_app(MemorySessionStore::with_selection(None), users);
    let response = app
        .oneshot(post_reset(
            &signed_reset_token(USER_ID, "reset-token"),
            "longenough",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(message_key(&body), "reset-password-token-expired");
}

#[tokio::test]
async fn reset_password_success_consumes_the_claim() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::Ok);
    let app = test_app(MemorySessionStore::with_selection(None), users.clone());
    let response = app
        .oneshot(post_reset(
            &signed_reset_token(USER_ID, "reset-token"),
            "longenough",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["passwordReset"], true);

    let calls = users.calls.lock().await;
    assert_eq!(calls.as_slice(), &[(user_id(), "reset-token".to_string())]);
}

#[tokio::test]
async fn reset_password_rejects_a_forged_claim() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::Ok);
    let app = test_app(MemorySessionStore::with_selection(None), users.clone());
    let response = app
        .oneshot(post_reset("not.a.claim", "longenough"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(message_key(&body), "reset-password-token-invalid");
    // The store must never see an unverified claim.
    assert!(users.calls.lock().await.is_empty());
}

#[tokio::test]
async fn reset_password_enforces_the_password_policy() {
    let users = MemoryUserStore::with_outcome(ResetOutcome::Ok);
    let app = test_app(MemorySessionStore::with_selection(None), users);
    let response = app
        .oneshot(post_reset(
            &signed_reset_token(USER_ID, "reset-token"),
            "short",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(message_key(&body), "reset-password-invalid-password");
}
