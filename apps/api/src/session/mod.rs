//! Preview sessions: one mounted preview of one resume instance.
//!
//! A session bundles the render surface, the scale controller observing it and
//! the export pipeline. Unmounting releases all three. Sessions nobody has
//! touched for a while are unmounted by the idle reaper.

pub mod handlers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compiler::compile;
use crate::export::{DownloadSink, ExportPipeline, Rasterizer};
use crate::layout::PageGeometry;
use crate::models::{ResumeContent, StyleRules};
use crate::sandbox::{RenderSurfaceHandle, SandboxHost};
use crate::scale::{LayoutSignals, ScaleController, SheetSize};

pub struct PreviewSession {
    pub id: Uuid,
    pub resume_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub surface: RenderSurfaceHandle,
    pub signals: LayoutSignals,
    pub scale: ScaleController,
    pub export: ExportPipeline,
    last_seen: Mutex<Instant>,
}

impl PreviewSession {
    fn touch(&self) {
        *self.last_seen() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen().elapsed()
    }

    fn last_seen(&self) -> MutexGuard<'_, Instant> {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns every mounted session. Shared across handlers behind an `Arc`.
pub struct SessionRegistry {
    host: SandboxHost,
    rasterizer: Arc<dyn Rasterizer>,
    sink: Arc<dyn DownloadSink>,
    export_timeout: Duration,
    sessions: Mutex<HashMap<Uuid, Arc<PreviewSession>>>,
}

impl SessionRegistry {
    pub fn new(
        host: SandboxHost,
        rasterizer: Arc<dyn Rasterizer>,
        sink: Arc<dyn DownloadSink>,
        export_timeout: Duration,
    ) -> Self {
        Self {
            host,
            rasterizer,
            sink,
            export_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &SandboxHost {
        &self.host
    }

    pub fn geometry(&self) -> &PageGeometry {
        self.host.shell().geometry()
    }

    /// Mounts a surface showing a blank sheet and starts observing its layout.
    pub async fn mount(&self, resume_id: Option<String>) -> Arc<PreviewSession> {
        let surface = self.host.mount();
        match compile(&ResumeContent::default(), &StyleRules::new()) {
            Ok(blank) => {
                self.host.update(surface, blank).await;
            }
            Err(e) => warn!(surface = %surface.id(), "Failed to compile blank sheet: {e}"),
        }
        let geometry = self.geometry();
        let signals = LayoutSignals::new(SheetSize {
            width: geometry.width_px(),
            height: geometry.height_px(),
        });
        let scale = ScaleController::observe(&signals);
        let export = ExportPipeline::new(
            Arc::clone(self.host.shell()),
            Arc::clone(&self.rasterizer),
            Arc::clone(&self.sink),
            self.export_timeout,
        );

        let session = Arc::new(PreviewSession {
            id: surface.id(),
            resume_id,
            created_at: Utc::now(),
            surface,
            signals,
            scale,
            export,
            last_seen: Mutex::new(Instant::now()),
        });
        self.sessions().insert(session.id, Arc::clone(&session));
        info!(
            session = %session.id,
            resume = ?session.resume_id,
            active = self.len(),
            "Preview session mounted"
        );
        session
    }

    /// Looks a session up and marks it as active.
    pub fn get(&self, id: Uuid) -> Option<Arc<PreviewSession>> {
        let session = self.sessions().get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Tears the session down: the surface discards in-flight updates and the
    /// resize observer is unregistered before this returns.
    pub async fn unmount(&self, id: Uuid) -> bool {
        let Some(session) = self.sessions().remove(&id) else {
            return false;
        };
        self.host.unmount(session.surface);
        session.scale.shutdown().await;
        info!(
            session = %id,
            observers = session.signals.observer_count(),
            age_secs = (Utc::now() - session.created_at).num_seconds(),
            "Preview session unmounted"
        );
        true
    }

    /// Unmounts every session untouched for at least `max_idle`. Sessions with
    /// an export in flight are left alone. Returns how many were unmounted.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<Uuid> = self
            .sessions()
            .values()
            .filter(|session| session.idle_for() >= max_idle && !session.export.state().is_busy())
            .map(|session| session.id)
            .collect();

        let mut reaped = 0;
        for id in idle {
            debug!(session = %id, "Reaping idle preview session");
            if self.unmount(id).await {
                reaped += 1;
            }
        }
        reaped
    }

    /// Periodically reaps sessions idle for `max_idle`. The task ends once the
    /// registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let period = (max_idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(sessions) = registry.upgrade() else {
                    break;
                };
                let reaped = sessions.reap_idle(max_idle).await;
                if reaped > 0 {
                    info!(reaped, active = sessions.len(), "Idle preview sessions reaped");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<PreviewSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{PdfDownload, UnavailableRasterizer};
    use crate::export::ExportError;
    use crate::layout::PAGE_GEOMETRY;
    use crate::models::Node;
    use crate::sandbox::surface::UpdateOutcome;
    use crate::sandbox::{DocumentShell, SandboxPolicy};
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl DownloadSink for NullSink {
        async fn deliver(&self, download: &PdfDownload) -> Result<String, ExportError> {
            Ok(download.filename.clone())
        }
    }

    fn registry() -> SessionRegistry {
        let shell = Arc::new(DocumentShell::new(PAGE_GEOMETRY, SandboxPolicy::default(), None));
        SessionRegistry::new(
            SandboxHost::new(shell),
            Arc::new(UnavailableRasterizer::new("test")),
            Arc::new(NullSink),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_mount_registers_surface_and_observer() {
        let registry = registry();
        let session = registry.mount(Some("r1".to_string())).await;

        assert_eq!(registry.len(), 1);
        let blank = registry.host().snapshot(session.surface).unwrap();
        assert_eq!(blank.revision, 1);
        assert!(blank.document.contains("class=\"resume\""));
        assert_eq!(session.signals.observer_count(), 1);
        assert_eq!(registry.get(session.id).unwrap().resume_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_unmount_releases_everything() {
        let registry = registry();
        let session = registry.mount(None).await;

        assert!(registry.unmount(session.id).await);
        assert!(registry.get(session.id).is_none());
        assert!(registry.host().begin(session.surface).is_none());
        assert_eq!(session.signals.observer_count(), 0);
        assert!(!registry.unmount(session.id).await);
    }

    #[tokio::test]
    async fn test_resize_does_not_reload_content() {
        let registry = registry();
        let session = registry.mount(None).await;
        let content = ResumeContent {
            nodes: vec![Node::heading(1, "Jane Doe")],
            ..Default::default()
        };
        let report = registry
            .host()
            .render(session.surface, content, StyleRules::new())
            .await;
        assert!(matches!(report.outcome, UpdateOutcome::Committed { revision: 2, .. }));

        let sheet = registry.geometry().width_px();
        let state = session
            .scale
            .settled(session.signals.resize_container(sheet * 0.8))
            .await;
        assert_eq!(state.factor.value(), 0.8);
        let state = session
            .scale
            .settled(session.signals.resize_container(sheet * 0.4))
            .await;
        assert_eq!(state.factor.value(), 0.4);

        assert_eq!(registry.host().snapshot(session.surface).unwrap().revision, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_reaped() {
        let registry = registry();
        let idle = registry.mount(None).await;
        let active = registry.mount(None).await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(registry.get(active.id).is_some());
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(registry.reap_idle(Duration::from_secs(30)).await, 1);
        assert!(registry.get(idle.id).is_none());
        assert!(registry.host().begin(idle.surface).is_none());
        assert_eq!(idle.signals.observer_count(), 0);

        assert!(registry.get(active.id).is_some());
        assert_eq!(active.signals.observer_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_unmounts_abandoned_sessions() {
        let registry = Arc::new(registry());
        let session = registry.mount(None).await;
        let reaper = registry.spawn_reaper(Duration::from_secs(8));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(registry.len(), 0);
        assert_eq!(session.signals.observer_count(), 0);

        drop(registry);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(reaper.is_finished());
    }
}
