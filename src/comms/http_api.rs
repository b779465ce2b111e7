use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

use crate::config::Config;
use crate::registry::sweeper::spawn_sweeper;
use crate::registry::{InvalidToken, TokenRegistry, TOKEN_TTL_SECS};
use crate::security::{ApiKey, AuditLogger, API_KEY_HEADER};

type SharedState = Arc<AppState>;

#[derive(Debug)]
pub struct AppState {
    pub registry: Arc<TokenRegistry>,
    pub api_key: ApiKey,
    pub redirect_base: Url,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(registry: Arc<TokenRegistry>, api_key: ApiKey, redirect_base: Url) -> Self {
        Self {
            registry,
            api_key,
            redirect_base,
            audit: AuditLogger::new(),
        }
    }

    pub fn from_config(config: &Config, registry: Arc<TokenRegistry>) -> Result<Self> {
        Ok(Self::new(
            registry,
            ApiKey::new(config.api_key.clone()),
            config.redirect_url()?,
        ))
    }
}

/// Failures surfaced to API callers as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    Unauthorized,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// Peer address for audit records: connect info, then proxy headers.
fn client_addr(parts: &Parts) -> String {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Proof that the request carried the shared secret. Extracted before the
/// body, so unauthenticated requests never reach the registry.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

impl FromRequestParts<SharedState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if state.api_key.verify(provided) {
            return Ok(Authorized);
        }

        let reason = if provided.is_some() {
            "key mismatch"
        } else {
            "key missing"
        };
        state
            .audit
            .auth_failure(&client_addr(parts), parts.uri.path(), reason);
        Err(ApiError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateTokenRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateTokenResponse {
    pub token: String,
    pub url: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct ValidateTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub customer_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub message: String,
    pub removed: usize,
    pub remaining: usize,
}

/// Downstream address carrying the token and customer id as query params.
pub fn handoff_url(base: &Url, token: &str, customer_id: &str) -> String {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("customer-id", customer_id);
    url.into()
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn generate_token(
    _auth: Authorized,
    State(state): State<SharedState>,
    body: Result<Json<GenerateTokenRequest>, JsonRejection>,
) -> Result<Json<GenerateTokenResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::MissingField("customer_id"))?;
    let customer_id = req
        .customer_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("customer_id"))?;

    let record = state.registry.issue(customer_id);
    state.audit.token_issued(&record.customer_id, &record.token);

    let url = handoff_url(&state.redirect_base, &record.token, &record.customer_id);
    Ok(Json(GenerateTokenResponse {
        expires_in: record.expires_in(),
        token: record.token,
        url,
    }))
}

async fn validate_token(
    _auth: Authorized,
    State(state): State<SharedState>,
    body: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Json<ValidateTokenResponse>, ApiError> {
    // An unreadable body carries no token; it misses like an empty one.
    let token = body
        .ok()
        .and_then(|Json(req)| req.token)
        .unwrap_or_default();

    match state.registry.check(&token) {
        Ok(customer_id) => Ok(Json(ValidateTokenResponse {
            valid: true,
            customer_id,
        })),
        Err(invalid) => {
            state.audit.token_rejected(&token);
            Err(invalid.into())
        }
    }
}

async fn cleanup_tokens(
    _auth: Authorized,
    State(state): State<SharedState>,
) -> Json<CleanupResponse> {
    let report = state.registry.sweep();
    state.audit.tokens_swept(report.removed, report.remaining);
    Json(CleanupResponse {
        message: "Cleanup complete".to_string(),
        removed: report.removed,
        remaining: report.remaining,
    })
}

pub fn create_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/generate-token", post(generate_token))
        .route("/validate-token", post(validate_token))
        .route("/cleanup-tokens", post(cleanup_tokens));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("shutdown signal received, draining connections");
}

pub async fn serve(config: Config) -> Result<()> {
    let registry = Arc::new(TokenRegistry::new());
    let state = Arc::new(AppState::from_config(&config, registry.clone())?);

    let sweeper = config.sweep_interval().map(|interval| {
        info!(interval_secs = interval.as_secs(), "background sweeper started");
        spawn_sweeper(registry.clone(), interval)
    });

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(ttl_secs = TOKEN_TTL_SECS, "token service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }
    info!(tokens = registry.len(), "token service stopped");
    Ok(())
}
