//! Request handlers and the pieces they share.

pub mod health;
pub mod reset_password;
pub mod sites;

#[cfg(test)]
mod tests;

use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::i18n;
use crate::session::{extract_session_token, hash_session_token, SessionRecord, SessionStore};

/// One expected-condition error, keyed for client-side localization.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorEntity {
    #[serde(rename = "messageKey")]
    pub message_key: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorEntity>,
}

pub(crate) fn error_response(key: &str) -> ErrorResponse {
    ErrorResponse {
        errors: vec![ErrorEntity {
            message_key: key.to_string(),
            message: i18n::message(key).unwrap_or(key).to_string(),
        }],
    }
}

/// Resolve the request's session or fail with the status the caller should
/// return: 401 when no valid session is presented, 500 on lookup failure.
pub(crate) async fn require_session(
    headers: &HeaderMap,
    sessions: &Arc<dyn SessionStore>,
) -> Result<SessionRecord, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let token_hash = hash_session_token(&token);
    match sessions.lookup(&token_hash).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
