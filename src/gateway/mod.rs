//! Axum-based HTTP gateway with body limits, timeouts, and bearer-token auth.
//!
//! The gateway owns every route and the HTTP envelope around them:
//! - Request body size limit (64KB max)
//! - Request timeouts (30s) to prevent slow-loris attacks
//! - CORS for browser clients
//! - Bearer-token guard on the feedback routes
//!
//! Handlers stay thin: parse the body, call a store, wrap the result.
//! Anything that can fail returns [`Error`], which maps itself to a
//! status code and an `{"error": ...}` body.

pub mod guard;

use crate::auth::{load_or_generate_secret, AccountStore, PasswordHasher, TokenIssuer};
use crate::config::Config;
use crate::error::Error;
use crate::feedback::FeedbackStore;
use anyhow::{bail, Context};
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize as GatewayDeserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — generous for key stretching, tight enough to shed stalls
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all gateway routes.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountStore>,
    pub feedback: Arc<FeedbackStore>,
    pub tokens: Arc<TokenIssuer>,
}

/// Assemble the route table and middleware stack around the given state.
pub fn build_router(state: AppState) -> Router {
    // ── CORS — allow browser clients to connect from any origin ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(handle_auth_register))
        .route("/api/auth/login", post(handle_auth_login))
        .route("/api/feedback/submit", post(handle_feedback_submit))
        .route("/api/feedback/history", get(handle_feedback_history))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Open the stores, bind the listener, and serve until shutdown.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let hasher = PasswordHasher::new(config.auth.pbkdf2_rounds);
    let accounts = AccountStore::open(&data_dir.join("accounts.db"), hasher)
        .context("failed to open account store")?;
    let feedback = FeedbackStore::open(&data_dir.join("feedback.db"))
        .context("failed to open feedback store")?;

    let secret = match &config.auth.token_secret {
        Some(s) if s.trim().is_empty() => bail!("auth.token_secret is set but empty"),
        Some(s) => s.trim().to_string(),
        None => load_or_generate_secret(&data_dir)?,
    };
    let tokens = TokenIssuer::new(&secret, config.auth.token_ttl_secs);

    let state = AppState {
        accounts: Arc::new(accounts),
        feedback: Arc::new(feedback),
        tokens: Arc::new(tokens),
    };
    let app = build_router(state);

    let host = &config.gateway.host;
    let addr: SocketAddr = format!("{host}:{}", config.gateway.port)
        .parse()
        .with_context(|| format!("invalid bind address {host}:{}", config.gateway.port))?;
    if !addr.ip().is_loopback() {
        tracing::warn!(
            "binding {addr} exposes the gateway beyond localhost; there is no built-in rate limiting"
        );
    }
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_port = listener.local_addr()?.port();
    let display_addr = format!("{host}:{actual_port}");

    println!("🦀 EchoBox Gateway listening on http://{display_addr}");
    println!("  POST /api/auth/register    — create a new account");
    println!("  POST /api/auth/login       — exchange credentials for a bearer token");
    println!("  POST /api/feedback/submit  — store a feedback entry (bearer token)");
    println!("  GET  /api/feedback/history — your submissions, newest first (bearer token)");
    println!("  GET  /health    — health check");
    println!("  Press Ctrl+C to stop.\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No handler could be installed; the default disposition still
        // terminates the process, so park this future instead.
        std::future::pending::<()>().await;
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for handlers (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Request body for account registration.
#[derive(GatewayDeserialize)]
struct AuthRegisterBody {
    username: String,
    email: String,
    password: String,
}

/// Request body for login. `email` also accepts a username.
#[derive(GatewayDeserialize)]
struct AuthLoginBody {
    email: String,
    password: String,
}

/// Request body for a feedback submission.
#[derive(GatewayDeserialize)]
struct FeedbackSubmitBody {
    display_name: String,
    contact_email: String,
    message: String,
}

/// GET /health — always public.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// POST /api/auth/register — create a new account.
async fn handle_auth_register(
    State(state): State<AppState>,
    body: Result<Json<AuthRegisterBody>, JsonRejection>,
) -> Result<ApiResponse, Error> {
    let Json(body) = body.map_err(|e| Error::InvalidInput(format!("invalid request: {e}")))?;

    let account = state
        .accounts
        .register(&body.username, &body.email, &body.password)?;
    let token = state.tokens.issue(&account.id)?;
    tracing::info!(username = %account.username, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "account": account, "token": token })),
    ))
}

/// POST /api/auth/login — exchange credentials for a bearer token.
async fn handle_auth_login(
    State(state): State<AppState>,
    body: Result<Json<AuthLoginBody>, JsonRejection>,
) -> Result<ApiResponse, Error> {
    let Json(body) = body.map_err(|e| Error::InvalidInput(format!("invalid request: {e}")))?;

    let account = state.accounts.authenticate(&body.email, &body.password)?;
    let token = state.tokens.issue(&account.id)?;
    tracing::info!(username = %account.username, "login");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "account": account, "token": token })),
    ))
}

/// POST /api/feedback/submit — store one feedback entry for the caller.
/// The auth check runs before the body is even looked at.
async fn handle_feedback_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FeedbackSubmitBody>, JsonRejection>,
) -> Result<ApiResponse, Error> {
    let account = guard::require_account(&state, &headers)?;
    let Json(body) = body.map_err(|e| Error::InvalidInput(format!("invalid request: {e}")))?;

    let record = state.feedback.submit(
        &account.id,
        &body.display_name,
        &body.contact_email,
        &body.message,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "record": record })),
    ))
}

/// GET /api/feedback/history — the caller's submissions, newest first.
async fn handle_feedback_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse, Error> {
    let account = guard::require_account(&state, &headers)?;
    let records = state.feedback.list_for_owner(&account.id)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "records": records })),
    ))
}

// ── Tests ───────────────────────────────────────────────────────────
