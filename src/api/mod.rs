//! Router assembly and the HTTP server lifecycle.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::session::{PgSessionStore, SessionStore};
use crate::sites::{PgSiteDirectory, SiteBrowser, SiteDirectory};
use crate::token::TokenKey;
use crate::users::{PgUserStore, UserStore};

pub mod handlers;
mod openapi;

use handlers::{health, reset_password, sites};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Assemble the application router with its collaborators injected.
///
/// Split out from [`serve`] so tests can mount the same routes over
/// in-memory stores.
pub fn app(
    pool: PgPool,
    directory: Arc<dyn SiteDirectory>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    token_key: TokenKey,
) -> Router {
    let browser = SiteBrowser::new(directory);

    Router::new()
        .merge(openapi::swagger_ui())
        .route("/health", get(health::health))
        .route("/v1/site/currentSite", get(sites::current_site))
        .route(
            "/v1/site/filter/:filter/archived/:archived",
            get(sites::filter_sites),
        )
        .route("/v1/site/switch/:id", put(sites::switch_site))
        .route(
            "/v1/authentication/reset-password",
            post(reset_password::reset_password),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(sessions))
                .layer(Extension(browser))
                .layer(Extension(users))
                .layer(Extension(token_key))
                .layer(Extension(pool)),
        )
}

/// Connect to the database, wire the Postgres-backed collaborators, and
/// serve until a shutdown signal arrives.
///
/// # Errors
/// Returns an error if the database is unreachable or the listener cannot
/// be bound.
pub async fn serve(port: u16, dsn: String, token_key: TokenKey) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let directory: Arc<dyn SiteDirectory> = Arc::new(PgSiteDirectory::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));

    let app = app(pool, directory, sessions, users, token_key);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
