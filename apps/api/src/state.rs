use std::sync::Arc;

use crate::session::SessionRegistry;
use crate::source::ResumeSource;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Read-only resume persistence API. `None` when `RESUME_API_URL` is unset.
    pub source: Option<Arc<dyn ResumeSource>>,
}
