//! Password reset endpoint.
//!
//! One-shot per request: parse the signed claim, then ask the user store to
//! consume the pending reset. Expected outcomes map to 4xx with message
//! keys; everything else is a 500.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::token::{self, TokenKey};
use crate::users::{ResetPasswordError, UserStore};

#[derive(ToSchema, Deserialize, Debug)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ResetPasswordResponse {
    #[serde(rename = "passwordReset")]
    pub password_reset: bool,
}

/// At least eight characters, no whitespace.
fn valid_password(password: &str) -> bool {
    Regex::new(r"^\S{8,}$").map_or(false, |re| re.is_match(password))
}

#[utoipa::path(
    post,
    path = "/v1/authentication/reset-password",
    request_body = ResetPasswordForm,
    responses(
        (status = 200, description = "Password reset applied", body = ResetPasswordResponse),
        (status = 400, description = "Unknown login, mismatched token, or weak password", body = ErrorResponse),
        (status = 401, description = "Invalid or expired reset claim", body = ErrorResponse),
        (status = 500, description = "Unexpected error"),
    ),
    tag = "authentication"
)]
pub async fn reset_password(
    Extension(users): Extension<Arc<dyn UserStore>>,
    Extension(key): Extension<TokenKey>,
    payload: Option<Json<ResetPasswordForm>>,
) -> impl IntoResponse {
    let Some(Json(form)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if form.token.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(error_response("reset-password-token-invalid")),
        )
            .into_response();
    }
    if !valid_password(&form.password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(error_response("reset-password-invalid-password")),
        )
            .into_response();
    }

    let now = token::now_unix_seconds();

    // A claim that fails here never reaches the store; the store-level
    // outcomes below only apply to well-formed, correctly signed claims.
    let claims = match token::parse(&key, form.token.trim(), now) {
        Ok(claims) => claims,
        Err(token::Error::Expired) => {
            warn!("Rejected expired reset claim");
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_response("reset-password-token-expired")),
            )
                .into_response();
        }
        Err(err) => {
            warn!("Rejected reset claim: {err}");
            return (
                StatusCode::UNAUTHORIZED,
                Json(error_response("reset-password-token-invalid")),
            )
                .into_response();
        }
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        warn!("Reset claim subject is not a user id");
        return (
            StatusCode::UNAUTHORIZED,
            Json(error_response("reset-password-token-invalid")),
        )
            .into_response();
    };

    match users
        .reset_password(user_id, &claims.jti, &form.password, now)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(ResetPasswordResponse {
                password_reset: true,
            }),
        )
            .into_response(),
        Err(ResetPasswordError::NoSuchUser) => (
            StatusCode::BAD_REQUEST,
            Json(error_response("please-enter-a-valid-login")),
        )
            .into_response(),
        Err(ResetPasswordError::InvalidToken) => (
            StatusCode::BAD_REQUEST,
            Json(error_response("reset-password-token-invalid")),
        )
            .into_response(),
        Err(ResetPasswordError::Expired) => (
            StatusCode::UNAUTHORIZED,
            Json(error_response("reset-password-token-expired")),
        )
            .into_response(),
        Err(ResetPasswordError::Database(err)) => {
            error!("Failed to reset password: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
