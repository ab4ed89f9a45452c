//! Axum route handlers for the Compile API.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::compiler::{compile_with, CompileMode};
use crate::errors::AppError;
use crate::models::{ResumeContent, StyleRules};

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub content: ResumeContent,
    #[serde(default)]
    pub style_rules: StyleRules,
    #[serde(default)]
    pub mode: CompileMode,
}

#[derive(Debug, Serialize)]
pub struct CompileResponse {
    pub markup: String,
    pub mode: CompileMode,
    pub size_bytes: usize,
}

/// POST /api/v1/compile
/// Compiles content and style rules into standalone sheet markup.
/// Returns 422 with the compilation error when the tree cannot be rendered.
pub async fn handle_compile(Json(req): Json<CompileRequest>) -> Result<Json<CompileResponse>, AppError> {
    let mode = req.mode;
    let doc = tokio::task::spawn_blocking(move || compile_with(&req.content, &req.style_rules, mode))
        .await
        .map_err(|e| anyhow::anyhow!("Compile task failed: {e}"))??;

    let markup = doc.into_string();
    Ok(Json(CompileResponse {
        size_bytes: markup.len(),
        markup,
        mode,
    }))
}
