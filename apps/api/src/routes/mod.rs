pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::compiler::handlers as compile;
use crate::session::handlers as preview;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Compile API
        .route("/api/v1/compile", post(compile::handle_compile))
        // Preview API
        .route("/api/v1/previews", post(preview::handle_mount))
        .route("/api/v1/previews/:id", delete(preview::handle_unmount))
        .route("/api/v1/previews/:id/content", put(preview::handle_render))
        .route("/api/v1/previews/:id/document", get(preview::handle_document))
        .route("/api/v1/previews/:id/viewport", post(preview::handle_viewport))
        .route("/api/v1/previews/:id/scale", get(preview::handle_scale))
        .route("/api/v1/previews/:id/export", post(preview::handle_export))
        .route(
            "/api/v1/previews/:id/export/status",
            get(preview::handle_export_status),
        )
        .with_state(state)
}
