//! HTTP API Server
//!
//! REST surface over the session manager: look sessions up and request
//! state or role changes.

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::manager::{SessionManager, SessionRequest};
use crate::session::SessionTarget;

/// Shared application state
pub struct AppState {
    pub manager: SessionManager,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, manager: SessionManager) -> Self {
        Self {
            config,
            state: Arc::new(AppState { manager }),
        }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(handle_health))
            .route("/sessions/locate", post(handle_locate))
            .route("/sessions/modify", post(handle_modify))
            .route("/sessions/:session_id", get(handle_session))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("HTTP API disabled");
            return Ok(());
        }

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Request/Response Types ============

/// Locate request
#[derive(Debug, Deserialize, Serialize)]
pub struct LocateRequest {
    pub target: SessionTarget,
    #[serde(default)]
    pub remote_system: Option<String>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Ambiguous(_) | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::IllegalTransition { .. } => StatusCode::CONFLICT,
        Error::TransitionLocked { .. } => StatusCode::LOCKED,
        Error::RemoteAction { .. }
        | Error::RoleModify { .. }
        | Error::RefreshAfterChange { .. }
        | Error::Remote(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: Error) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
        .into_response()
}

// ============ Handlers ============

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state
        .manager
        .show(&SessionTarget::SessionId(session_id), None)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_locate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocateRequest>,
) -> Response {
    match state
        .manager
        .show(&request.target, request.remote_system.as_deref())
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_modify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Response {
    tracing::debug!("Modify request for {}", request.target);
    match state.manager.apply(&request).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}
