use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::compiler::CompilationError;
use crate::export::ExportError;
use crate::source::SourceError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Compilation error: {0}")]
    Compilation(#[from] CompilationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Resume source error: {0}")]
    Source(#[from] SourceError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Compilation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "COMPILATION_ERROR",
                e.to_string(),
            ),
            AppError::Export(e) => {
                tracing::warn!("Export failed: {e}");
                let status = match e {
                    ExportError::Compilation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ExportError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    ExportError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.code(), e.to_string())
            }
            AppError::Source(SourceError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Resume {id} not found"),
            ),
            AppError::Source(SourceError::InvalidId(id)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Invalid resume id '{id}'"),
            ),
            AppError::Source(e) => {
                tracing::error!("Resume source error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "SOURCE_ERROR",
                    "The resume could not be loaded".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_maps_to_422() {
        let err = AppError::from(CompilationError::UnresolvedReference {
            name: "skills".to_string(),
        });
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "COMPILATION_ERROR");
        assert!(message.contains("skills"));
    }

    #[test]
    fn test_export_statuses() {
        let timeout = AppError::from(ExportError::Timeout { secs: 5 });
        assert_eq!(timeout.parts().0, StatusCode::GATEWAY_TIMEOUT);

        let raster = AppError::from(ExportError::Rasterization("crashed".to_string()));
        let (status, code, _) = raster.parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "EXPORT_FAILED");
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::from(anyhow::anyhow!("secret path /etc/x"));
        let (status, _, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret"));
    }
}
