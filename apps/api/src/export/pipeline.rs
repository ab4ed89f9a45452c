//! Export pipeline state machine.
//!
//! `Idle -> Compiling -> Rasterizing -> Downloading -> Idle` on success, any
//! stage `-> Failed -> Idle` on error. Exports on one pipeline are serialized
//! by a gate; a second caller waits for the first to settle and then starts
//! fresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::compiler::{compile_with, CompileMode};
use crate::export::download::{download_filename, DownloadSink, PdfDownload};
use crate::export::rasterizer::{validate_pdf, Rasterizer};
use crate::export::{ExportError, ExportState};
use crate::models::{ResumeContent, StyleRules};
use crate::sandbox::DocumentShell;

#[derive(Debug, Clone, Serialize)]
pub struct ExportReceipt {
    pub filename: String,
    pub size_bytes: usize,
    pub location: String,
    pub completed_at: DateTime<Utc>,
    #[serde(skip)]
    pub pdf: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportStatus {
    pub state: ExportState,
    pub busy: bool,
    pub last_error: Option<String>,
    pub last_filename: Option<String>,
}

#[derive(Default)]
struct History {
    last_error: Option<String>,
    last_filename: Option<String>,
}

pub struct ExportPipeline {
    shell: Arc<DocumentShell>,
    rasterizer: Arc<dyn Rasterizer>,
    sink: Arc<dyn DownloadSink>,
    timeout: Duration,
    state: watch::Sender<ExportState>,
    gate: tokio::sync::Mutex<()>,
    history: Mutex<History>,
}

/// Returns the pipeline to `Idle` however the export ends, including when the
/// caller's future is dropped mid-export.
struct SettleGuard<'a> {
    state: &'a watch::Sender<ExportState>,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(ExportState::Idle);
    }
}

impl ExportPipeline {
    pub fn new(
        shell: Arc<DocumentShell>,
        rasterizer: Arc<dyn Rasterizer>,
        sink: Arc<dyn DownloadSink>,
        timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self {
            shell,
            rasterizer,
            sink,
            timeout,
            state,
            gate: tokio::sync::Mutex::new(()),
            history: Mutex::new(History::default()),
        }
    }

    pub fn state(&self) -> ExportState {
        *self.state.borrow()
    }

    pub fn status(&self) -> ExportStatus {
        let history = self.history();
        let state = self.state();
        ExportStatus {
            state,
            busy: state.is_busy(),
            last_error: history.last_error.clone(),
            last_filename: history.last_filename.clone(),
        }
    }

    /// Compiles `content` for print, rasterizes it and delivers the PDF.
    /// Errors are returned once; nothing is retried.
    pub async fn export_to_pdf(
        &self,
        content: ResumeContent,
        rules: StyleRules,
    ) -> Result<ExportReceipt, ExportError> {
        let _gate = self.gate.lock().await;
        let _settle = SettleGuard { state: &self.state };

        let result = self.run(content, rules).await;
        match &result {
            Ok(receipt) => {
                info!(
                    filename = %receipt.filename,
                    size = receipt.size_bytes,
                    "Export completed"
                );
                let mut history = self.history();
                history.last_error = None;
                history.last_filename = Some(receipt.filename.clone());
            }
            Err(e) => {
                self.transition(ExportState::Failed);
                warn!(code = e.code(), "Export failed: {e}");
                self.history().last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        content: ResumeContent,
        rules: StyleRules,
    ) -> Result<ExportReceipt, ExportError> {
        self.transition(ExportState::Compiling);
        let filename = download_filename(&content.title);
        let shell = Arc::clone(&self.shell);
        let html = tokio::task::spawn_blocking(move || -> Result<String, ExportError> {
            let doc = compile_with(&content, &rules, CompileMode::Static)?;
            Ok(shell.print(&doc, &content.title))
        })
        .await
        .map_err(|e| ExportError::Task(e.to_string()))??;

        self.transition(ExportState::Rasterizing);
        let geometry = *self.shell.geometry();
        let pdf = tokio::time::timeout(self.timeout, self.rasterizer.rasterize(&html, &geometry))
            .await
            .map_err(|_| ExportError::Timeout {
                secs: self.timeout.as_secs(),
            })??;
        validate_pdf(&pdf)?;
        debug!(
            rasterizer = self.rasterizer.name(),
            size = pdf.len(),
            "Document rasterized"
        );

        self.transition(ExportState::Downloading);
        let download = PdfDownload {
            filename,
            bytes: pdf,
        };
        let location = self.sink.deliver(&download).await?;

        Ok(ExportReceipt {
            size_bytes: download.bytes.len(),
            filename: download.filename,
            location,
            completed_at: Utc::now(),
            pdf: download.bytes,
        })
    }

    fn transition(&self, next: ExportState) {
        let previous = self.state.send_replace(next);
        debug!(from = ?previous, to = ?next, "Export state changed");
    }

    fn history(&self) -> std::sync::MutexGuard<'_, History> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
