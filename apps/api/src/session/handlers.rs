//! Axum route handlers for the Preview API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{ExportReceipt, ExportStatus};
use crate::layout::PageGeometry;
use crate::models::{ResumeContent, StyleRules};
use crate::sandbox::{FrameDescriptor, RenderReport};
use crate::scale::{Presentation, ScaleFactor, ScaleState, SheetSize};
use crate::session::PreviewSession;
use crate::state::AppState;

/// Upper bound on waiting for the scale observer to catch up with a report.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct MountRequest {
    pub resume_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MountResponse {
    pub id: Uuid,
    pub resume_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub document_url: String,
    pub frame: FrameDescriptor,
    pub scale: ScaleResponse,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub content: ResumeContent,
    #[serde(default)]
    pub style_rules: StyleRules,
}

/// Layout measurements reported by the host page. Any subset may be sent.
#[derive(Debug, Default, Deserialize)]
pub struct ViewportReport {
    pub container_width: Option<f64>,
    pub sheet_width: Option<f64>,
    pub sheet_height: Option<f64>,
    #[serde(default)]
    pub window_resized: bool,
}

#[derive(Debug, Serialize)]
pub struct ScaleResponse {
    pub factor: ScaleFactor,
    pub measured: bool,
    pub sheet: SheetSize,
    /// Physical pages the sheet's logical height spans.
    pub pages: u32,
    pub presentation: Presentation,
}

impl ScaleResponse {
    fn new(state: ScaleState, geometry: &PageGeometry) -> Self {
        Self {
            factor: state.factor,
            measured: state.measured,
            sheet: state.sheet,
            pages: geometry.pages_for_height(state.sheet.height),
            presentation: state.presentation(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub content: Option<ResumeContent>,
    pub style_rules: Option<StyleRules>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/previews
pub async fn handle_mount(
    State(state): State<AppState>,
    body: Option<Json<MountRequest>>,
) -> Result<(StatusCode, Json<MountResponse>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let session = state.sessions.mount(req.resume_id).await;
    let frame = state
        .sessions
        .host()
        .shell()
        .policy()
        .frame(state.sessions.geometry());

    Ok((
        StatusCode::CREATED,
        Json(MountResponse {
            id: session.id,
            resume_id: session.resume_id.clone(),
            created_at: session.created_at,
            document_url: format!("/api/v1/previews/{}/document", session.id),
            frame,
            scale: ScaleResponse::new(session.scale.current(), state.sessions.geometry()),
        }),
    ))
}

/// PUT /api/v1/previews/:id/content
/// Content that does not compile is shown as a diagnostic inside the surface;
/// the request itself still succeeds.
pub async fn handle_render(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<RenderReport>, AppError> {
    let session = find_session(&state, id)?;
    let report = state
        .sessions
        .host()
        .render(session.surface, req.content, req.style_rules)
        .await;
    Ok(Json(report))
}

/// GET /api/v1/previews/:id/document
/// Serves the surface document with the sandbox policy as a response header.
pub async fn handle_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let session = find_session(&state, id)?;
    let host = state.sessions.host();

    let snapshot = host
        .snapshot(session.surface)
        .ok_or_else(|| AppError::NotFound(format!("Preview {id} has no document")))?;
    let etag = format!("\"g{}-r{}\"", snapshot.generation, snapshot.revision);

    let headers = [
        (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
        (header::ETAG, etag),
        (
            header::CONTENT_SECURITY_POLICY,
            host.shell().policy().header_value(),
        ),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        (header::REFERRER_POLICY, "no-referrer".to_string()),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((headers, snapshot.document.to_string()).into_response())
}

/// POST /api/v1/previews/:id/viewport
pub async fn handle_viewport(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(report): Json<ViewportReport>,
) -> Result<Json<ScaleResponse>, AppError> {
    let session = find_session(&state, id)?;
    let signals = &session.signals;
    let mut revision = None;

    if report.sheet_width.is_some() || report.sheet_height.is_some() {
        let current = signals.sheet();
        revision = Some(signals.resize_sheet(SheetSize {
            width: report.sheet_width.unwrap_or(current.width),
            height: report.sheet_height.unwrap_or(current.height),
        }));
    }
    if let Some(width) = report.container_width {
        revision = Some(signals.resize_container(width));
    }
    if report.window_resized {
        revision = Some(signals.window_resized());
    }

    let Some(revision) = revision else {
        return Err(AppError::Validation(
            "Viewport report must contain at least one measurement".to_string(),
        ));
    };

    let scale = match tokio::time::timeout(SETTLE_TIMEOUT, session.scale.settled(revision)).await {
        Ok(scale) => scale,
        Err(_) => {
            debug!(session = %id, revision, "Scale observer did not settle in time");
            session.scale.current()
        }
    };
    Ok(Json(ScaleResponse::new(scale, state.sessions.geometry())))
}

/// GET /api/v1/previews/:id/scale
pub async fn handle_scale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScaleResponse>, AppError> {
    let session = find_session(&state, id)?;
    Ok(Json(ScaleResponse::new(
        session.scale.current(),
        state.sessions.geometry(),
    )))
}

/// POST /api/v1/previews/:id/export
/// Uses inline content when given, otherwise loads the session's resume from
/// the resume source. Responds with the PDF as an attachment.
pub async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<ExportRequest>>,
) -> Result<Response, AppError> {
    let session = find_session(&state, id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (content, rules) = match req.content {
        Some(content) => (content, req.style_rules.unwrap_or_default()),
        None => {
            let resume_id = session.resume_id.as_deref().ok_or_else(|| {
                AppError::Validation(
                    "No content supplied and the preview is not bound to a resume".to_string(),
                )
            })?;
            let source = state.source.as_ref().ok_or_else(|| {
                AppError::Validation(
                    "No content supplied and no resume source is configured".to_string(),
                )
            })?;
            let snapshot = source.load(resume_id, bearer_token(&headers)).await?;
            (
                snapshot.content,
                req.style_rules.unwrap_or(snapshot.style_rules),
            )
        }
    };

    let receipt = session.export.export_to_pdf(content, rules).await?;
    Ok(pdf_response(receipt))
}

/// GET /api/v1/previews/:id/export/status
pub async fn handle_export_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExportStatus>, AppError> {
    let session = find_session(&state, id)?;
    Ok(Json(session.export.status()))
}

/// DELETE /api/v1/previews/:id
pub async fn handle_unmount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.unmount(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Preview {id} not found")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn find_session(state: &AppState, id: Uuid) -> Result<Arc<PreviewSession>, AppError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Preview {id} not found")))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn pdf_response(receipt: ExportReceipt) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", receipt.filename),
        ),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    (headers, receipt.pdf).into_response()
}
