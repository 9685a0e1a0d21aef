//! HTTP API: axum router, handlers, and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::auth::AuthService;
use crate::config::Config;
use crate::error::ApiError;
use crate::store::{Note, NoteStore, User};

/// Reject request bodies larger than 64 KB.
const MAX_BODY_SIZE: usize = 65_536;

/// Hard request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NoteStore>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn from_config(config: &Config, store: Arc<NoteStore>) -> Self {
        let auth = Arc::new(AuthService::new(
            store.clone(),
            &config.auth.secret_key,
            config.auth.token_ttl_minutes,
            config.auth.pbkdf2_rounds,
        ));
        Self { store, auth }
    }
}

/// Build the API router with CORS, body-limit, and timeout layers.
pub fn router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentialed CORS cannot use wildcards, so methods and headers
    // mirror the preflight request instead.
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(handle_auth_register))
        .route("/api/auth/login", post(handle_auth_login))
        .route("/api/notes/", get(handle_notes_list))
        .route("/api/notes/", post(handle_note_create))
        .route("/api/notes/{note_id}", get(handle_note_get))
        .route("/api/notes/{note_id}", axum::routing::put(handle_note_update))
        .route(
            "/api/notes/{note_id}",
            axum::routing::delete(handle_note_delete),
        )
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Open the store, bind, and serve until ctrl-c.
pub async fn run_server(config: Config) -> Result<()> {
    // ── Security: refuse a public bind with the placeholder secret ──
    if is_public_bind(&config.server.host) && config.auth.uses_default_secret() {
        anyhow::bail!(
            "🛑 Refusing to bind to {} with the default signing secret — anyone could mint tokens.\n\
             Fix: run `jotter init` to generate one, or set JOTTER_SECRET_KEY.",
            config.server.host
        );
    }
    if config.auth.uses_default_secret() {
        tracing::warn!(
            "serving with the default signing secret; run `jotter init` before exposing this instance"
        );
    }

    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = Arc::new(NoteStore::open(&db_path)?);
    tracing::info!("note store ready at {}", db_path.display());

    let state = AppState::from_config(&config, store);
    let app = router(state, &config.server.cors_allowed_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let display_addr = listener.local_addr()?;

    println!("🗒️  Jotter listening on http://{display_addr}");
    println!("  POST /api/auth/register — create an account");
    println!("  POST /api/auth/login    — exchange credentials for a token");
    println!("  GET  /api/notes/        — list your notes (Bearer auth)");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

fn is_public_bind(host: &str) -> bool {
    match host.parse::<std::net::IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => host != "localhost",
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Request body for account registration.
#[derive(Debug, Deserialize)]
struct RegisterBody {
    user_name: String,
    user_email: String,
    password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
struct LoginBody {
    user_email: String,
    password: String,
}

/// Request body for creating or updating a note.
#[derive(Debug, Deserialize)]
struct NoteBody {
    note_title: String,
    note_content: String,
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request: {rejection}"))
}

/// Extract bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the calling user, or fail with the uniform 401.
fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthenticated)?;
    state.auth.resolve(token)
}

/// GET /health — always public.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/auth/register — create a new user account.
async fn handle_auth_register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let user = state
        .auth
        .register(&body.user_name, &body.user_email, &body.password)?;
    Ok(Json(user))
}

/// POST /api/auth/login — exchange credentials for a bearer token.
async fn handle_auth_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let token = state.auth.login(&body.user_email, &body.password)?;
    Ok(Json(serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

/// GET /api/notes/ — all notes owned by the caller.
async fn handle_notes_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Note>>, ApiError> {
    let user = require_user(&state, &headers)?;
    let notes = state.store.list_notes(&user.user_id)?;
    Ok(Json(notes))
}

/// POST /api/notes/ — create a note owned by the caller.
async fn handle_note_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NoteBody>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let user = require_user(&state, &headers)?;
    let Json(body) = body.map_err(bad_json)?;
    let note = state
        .store
        .create_note(&user.user_id, &body.note_title, &body.note_content)?;
    Ok(Json(note))
}

/// GET /api/notes/{note_id} — fetch one note.
async fn handle_note_get(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Note>, ApiError> {
    let user = require_user(&state, &headers)?;
    match state.store.get_note(&user.user_id, &note_id)? {
        Some(note) => Ok(Json(note)),
        None => Err(ApiError::NotFound("Note")),
    }
}

/// PUT /api/notes/{note_id} — overwrite title and content.
async fn handle_note_update(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<NoteBody>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let user = require_user(&state, &headers)?;
    let Json(body) = body.map_err(bad_json)?;
    match state
        .store
        .update_note(&user.user_id, &note_id, &body.note_title, &body.note_content)?
    {
        Some(note) => Ok(Json(note)),
        None => Err(ApiError::NotFound("Note")),
    }
}

/// DELETE /api/notes/{note_id} — remove one note.
async fn handle_note_delete(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(&state, &headers)?;
    match state.store.delete_note(&user.user_id, &note_id)? {
        Some(_) => Ok(Json(serde_json::json!({
            "message": "Note deleted successfully"
        }))),
        None => Err(ApiError::NotFound("Note")),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
