//! HTTP API server exposing agent and meeting management plus the
//! call-platform webhook endpoint.

pub mod error;
pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::HeaderMap, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::ai::CompletionService;
use crate::api::error::ApiError;
use crate::config::{Config, PaginationConfig, WebhookConfig};
use crate::db::Database;
use crate::jobs::JobQueue;
use crate::lifecycle::LifecycleHandler;
use crate::platform::CallPlatform;

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub platform: Arc<dyn CallPlatform>,
    pub completions: Arc<dyn CompletionService>,
    pub jobs: JobQueue,
    pub lifecycle: Arc<LifecycleHandler>,
    pub webhook: WebhookConfig,
    pub pagination: PaginationConfig,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        db: Database,
        platform: Arc<dyn CallPlatform>,
        completions: Arc<dyn CompletionService>,
        jobs: JobQueue,
        config: &Config,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleHandler::new(
            db.clone(),
            platform.clone(),
            completions.clone(),
            jobs.clone(),
        ));
        Self {
            db,
            platform,
            completions,
            jobs,
            lifecycle,
            webhook: config.webhook.clone(),
            pagination: config.pagination.clone(),
            http: reqwest::Client::new(),
        }
    }
}

/// Resolve the authenticated user from request headers.
///
/// Authentication itself happens upstream; the proxy forwards the
/// verified identity in `x-user-id`.
pub fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Missing user identity"))
}

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState, config: &Config) -> Self {
        Self {
            port: config.server.port,
            state,
        }
    }

    /// Build the full application router. Exposed separately so tests can
    /// drive it without binding a socket.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .nest("/agents", routes::agents::router(state.clone()))
            .nest("/meetings", routes::meetings::router(state.clone()))
            .merge(routes::webhook::router(state))
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {addr}"))?;

        info!("API server listening on {}", addr);

        let app = Self::router(self.state);
        axum::serve(listener, app)
            .await
            .context("API server error")?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "huddle",
        "status": "ok",
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
