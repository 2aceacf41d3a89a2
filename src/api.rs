use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::status::RunStatus;
use crate::sync::{SyncError, SyncOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncOrchestrator>,
}

/// Operator surface. Unknown paths fall through to static files in
/// `static_dir`.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(|| async { "Sync service is running." }))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/health", get(|| async { "OK" }))
        .route("/api/manual-sync", post(manual_sync))
        .route("/api/last-sync-info", get(last_sync_info))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct MessageResp {
    message: &'static str,
}

async fn manual_sync(State(state): State<AppState>) -> impl IntoResponse {
    match state.sync.run_once().await {
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResp {
                message: "Manual sync triggered successfully.",
            }),
        ),
        Err(SyncError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(MessageResp {
                message: "Sync already in progress.",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "error during manual sync");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResp {
                    message: "Error during manual sync.",
                }),
            )
        }
    }
}

async fn last_sync_info(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.sync.status())
}
