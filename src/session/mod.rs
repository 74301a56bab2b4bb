//! Session lookup and per-session site selection state.
//!
//! Sessions are minted by the login front door; this service only resolves
//! the presented token and mutates the selection fields. Only a SHA-256
//! hash of the token is stored, so raw tokens never touch the database.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

const SESSION_COOKIE_NAME: &str = "retejo_session";

/// Resolved session state for a request.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub email: String,
    /// The site currently marked as selected, if any.
    pub selected_site_id: Option<String>,
}

/// Session persistence seam. Injected into handlers at construction time.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a token hash into a session record, if one exists.
    async fn lookup(&self, token_hash: &[u8]) -> anyhow::Result<Option<SessionRecord>>;

    /// Record a new site selection and drop the cached last search.
    async fn select_site(&self, token_hash: &[u8], site_id: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn lookup(&self, token_hash: &[u8]) -> anyhow::Result<Option<SessionRecord>> {
        let query = r"
            SELECT s.token_hash, s.user_id, s.selected_site_id, u.email
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| SessionRecord {
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            email: row.get("email"),
            selected_site_id: row.get("selected_site_id"),
        }))
    }

    async fn select_site(&self, token_hash: &[u8], site_id: &str) -> anyhow::Result<()> {
        let query = r"
            UPDATE sessions
            SET selected_site_id = $2,
                last_search = NULL
            WHERE token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .bind(site_id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }
}

/// Hash a session token for lookups; raw values never touch the database.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Pull the session token from the request: bearer header first, then the
/// session cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
