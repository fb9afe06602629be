//! Upload Gateway
//!
//! Single-binary Rust service that:
//! 1. Authenticates users against Google OAuth2
//! 2. Maintains server-side sessions and issues bearer credentials
//! 3. Invalidates credentials on logout via a TTL-bounded denylist
//! 4. Uploads videos to YouTube on the authenticated user's behalf

mod auth;
mod config;
mod error;
mod guard;
mod metrics;
mod upload;
mod youtube;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use auth_store::{Kv, RevocationStore, SessionStore, UserStore};
use google_auth::GoogleConfig;

use crate::auth::PendingLogins;
use crate::config::{Config, StoreBackend};
use crate::youtube::YoutubeClient;

/// Slack on top of the upload cap for multipart framing and text fields.
const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub google: GoogleConfig,
    pub http: reqwest::Client,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub revocations: RevocationStore,
    pub youtube: YoutubeClient,
    pub pending_logins: PendingLogins,
    pub cookie_key: Key,
    pub cors_origin: HeaderValue,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit enforces the configured max simultaneous requests;
/// the body limit caps uploads at the configured size plus framing overhead.
pub fn build_router(state: AppState) -> Router {
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(state.cors_origin.clone())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(true);

    let max_connections = state.config.server.max_connections;
    let body_limit = state.config.upload.max_bytes + BODY_LIMIT_OVERHEAD;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/success", get(auth::success))
        .route("/auth/failure", get(auth::failure))
        .route("/auth/consent-error", get(auth::consent_error))
        .route("/auth/status", get(auth::status))
        .route("/auth/logout", get(auth::logout))
        .route("/upload", post(upload::upload))
        .fallback(not_found_handler)
        .layer(cors)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting upload-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        redirect_uri = %config.google.redirect_uri,
        backend = ?config.store.backend,
        "configuration loaded"
    );

    let kv = match config.store.backend {
        StoreBackend::Redis => {
            let url = config
                .store
                .redis_url
                .clone()
                .context("store.redis_url missing")?;
            Kv::connect_redis(&url)
                .await
                .context("failed to connect to redis")?
        }
        StoreBackend::Memory => {
            warn!("using the in-process store backend — records do not survive restarts");
            Kv::memory()
        }
    };

    let cors_origin: HeaderValue = config
        .server
        .cors_origin
        .parse()
        .context("invalid cors_origin")?;
    let cookie_key = Key::derive_from(config.secrets.session_secret.expose().as_bytes());
    let google = config.google_config();
    let http = reqwest::Client::new();
    let listen_addr = config.server.listen_addr;

    let state = AppState {
        google,
        http: http.clone(),
        users: UserStore::new(kv.clone()),
        sessions: SessionStore::new(kv.clone()),
        revocations: RevocationStore::new(kv),
        youtube: YoutubeClient::new(http),
        pending_logins: PendingLogins::default(),
        cookie_key,
        cors_origin,
        started_at: Instant::now(),
        prometheus,
        config: Arc::new(config),
    };

    let app = build_router(state);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// GET / — welcome route.
async fn root_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "message": "Welcome to the Authentication API" }))
}

/// Health endpoint: status, uptime, and which store backend is live.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend = match state.config.store.backend {
        StoreBackend::Redis => "redis",
        StoreBackend::Memory => "memory",
    };
    axum::Json(serde_json::json!({
        "status": "healthy",
        "store_backend": backend,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// JSON 404 for undefined routes.
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "message": "Route not found" })),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
