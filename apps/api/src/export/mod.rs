//! Export pipeline: static recompilation, rasterization to PDF, and delivery.
//!
//! The rasterizer and the download sink are traits so the pipeline can be
//! driven by headless Chrome in production and by fakes in tests.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod download;
pub mod pipeline;
pub mod rasterizer;

use serde::Serialize;
use thiserror::Error;

use crate::compiler::CompilationError;

pub use download::{DownloadSink, FsDownloadSink, PdfDownload};
pub use pipeline::{ExportPipeline, ExportReceipt, ExportStatus};
pub use rasterizer::{Rasterizer, UnavailableRasterizer};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    #[error("Rasterizer produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("Rasterization timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Rasterizer unavailable: {0}")]
    Unavailable(String),

    #[error("Download failed: {0}")]
    Delivery(String),

    #[error("Export task failed: {0}")]
    Task(String),
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Compilation(_) => "COMPILATION_ERROR",
            ExportError::Rasterization(_) | ExportError::Task(_) => "EXPORT_FAILED",
            ExportError::InvalidOutput(_) => "EXPORT_INVALID_OUTPUT",
            ExportError::Timeout { .. } => "EXPORT_TIMEOUT",
            ExportError::Unavailable(_) => "EXPORT_UNAVAILABLE",
            ExportError::Delivery(_) => "EXPORT_DELIVERY_FAILED",
        }
    }
}

/// Where an export currently is. `Failed` is transient: the pipeline reports it
/// and returns to `Idle` before the next attempt can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    #[default]
    Idle,
    Compiling,
    Rasterizing,
    Downloading,
    Failed,
}

impl ExportState {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            ExportState::Compiling | ExportState::Rasterizing | ExportState::Downloading
        )
    }
}
