/// REST surface for the presentation layer
///
/// Thin projections over the tracker; no decision logic lives here. A
/// degraded (stale) response is indistinguishable from a fresh one, and
/// unavailability without a cached fallback maps to 503 with a retry hint.
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use crate::tokens::TokenTracker;

#[derive(Debug, Deserialize)]
struct FavoriteRequest {
    token_id: String,
    is_favorite: bool,
}

/// Build the application router
pub fn router(tracker: Arc<TokenTracker>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tokens", get(list_tokens))
        .route("/api/tokens/:id", get(get_token))
        .route("/api/tokens/:id/history/:days", get(get_history))
        .route("/api/search", get(search_tokens))
        .route("/api/favorites", get(list_favorites).post(set_favorite))
        .route("/api/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .with_state(tracker)
}

/// Bind and serve until shutdown is signalled
pub async fn serve(
    tracker: Arc<TokenTracker>,
    bind_address: &str,
    port: u16,
    shutdown: Arc<Notify>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    logger::info(LogTag::Web, &format!("Listening on http://{}", addr));

    let app = router(tracker);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    logger::info(LogTag::Web, "Web server stopped");
    Ok(())
}

fn error_response(err: TrackerError) -> Response {
    match err {
        TrackerError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Token not found" })),
        )
            .into_response(),
        TrackerError::Unavailable { retry_after_secs } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "Data temporarily unavailable. Please try again in a moment.",
                "retry_after": retry_after_secs,
            })),
        )
            .into_response(),
        TrackerError::Store(e) => {
            logger::error(LogTag::Web, &format!("Store failure: {}", e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            )
                .into_response()
        }
    }
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn list_tokens(State(tracker): State<Arc<TokenTracker>>) -> Response {
    match tracker.get_all_tokens().await {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_token(
    State(tracker): State<Arc<TokenTracker>>,
    Path(token_id): Path<String>,
) -> Response {
    match tracker.get_token(&token_id).await {
        Ok(token) => Json(token).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_history(
    State(tracker): State<Arc<TokenTracker>>,
    Path((token_id, days)): Path<(String, u32)>,
) -> Response {
    match tracker.get_history(&token_id, days).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => error_response(e),
    }
}

async fn search_tokens(
    State(tracker): State<Arc<TokenTracker>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").map(|s| s.as_str()).unwrap_or("");
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Search query is required" })),
        )
            .into_response();
    }

    match tracker.search_tokens(query) {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_favorites(State(tracker): State<Arc<TokenTracker>>) -> Response {
    match tracker.get_favorites() {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_favorite(
    State(tracker): State<Arc<TokenTracker>>,
    Json(request): Json<FavoriteRequest>,
) -> Response {
    match tracker.set_favorite(&request.token_id, request.is_favorite) {
        Ok(token) => Json(token).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_stats(State(tracker): State<Arc<TokenTracker>>) -> Response {
    match tracker.get_stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(e),
    }
}
