use axum::{
    Json, Router,
    routing::{get, post},
    response::{IntoResponse, Response},
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Result;

use crate::config::ServerConfig;
use crate::error::LimitError;
use crate::limits::LimitManager;
use crate::subscription::SubscriptionSource;

#[derive(Clone)]
pub struct AppState {
    pub limit_manager: Arc<LimitManager>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TierQuery {
    pub subscribed: Option<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/users/:user_id/limits/:collection", get(limit_handler))
        .route("/v1/users/:user_id/limits/:collection/timestamps", post(record_handler))
        .route("/v1/users/:user_id/limits/:collection/acquire", post(acquire_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn run(config: ServerConfig, state: AppState) -> Result<()> {
    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

impl IntoResponse for LimitError {
    fn into_response(self) -> Response {
        let status = match &self {
            LimitError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            LimitError::Store(_) => StatusCode::BAD_GATEWAY,
            LimitError::Clock(_) | LimitError::Subscription(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn resolve_tier(state: &AppState, user_id: &str, query: &TierQuery) -> Result<bool, LimitError> {
    match query.subscribed {
        Some(subscribed) => Ok(subscribed),
        None => Ok(state.subscriptions.is_subscribed(user_id).await?),
    }
}

async fn limit_handler(
    State(state): State<AppState>,
    Path((user_id, collection)): Path<(String, String)>,
    Query(query): Query<TierQuery>,
) -> Result<Response, LimitError> {
    let subscribed = resolve_tier(&state, &user_id, &query).await?;
    let limit = state
        .limit_manager
        .calculate_limit(&user_id, &collection, subscribed)
        .await?;

    Ok(Json(limit).into_response())
}

async fn record_handler(
    State(state): State<AppState>,
    Path((user_id, collection)): Path<(String, String)>,
) -> Result<Response, LimitError> {
    let record = state
        .limit_manager
        .record_timestamp(&user_id, &collection)
        .await?;

    Ok((StatusCode::CREATED, Json(record)).into_response())
}

async fn acquire_handler(
    State(state): State<AppState>,
    Path((user_id, collection)): Path<(String, String)>,
    Query(query): Query<TierQuery>,
) -> Result<Response, LimitError> {
    let subscribed = resolve_tier(&state, &user_id, &query).await?;
    let admission = state
        .limit_manager
        .try_acquire(&user_id, &collection, subscribed)
        .await?;

    let status = if admission.admitted {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    Ok((status, Json(admission)).into_response())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
