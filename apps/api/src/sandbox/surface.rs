//! Render surfaces and the host that owns them.
//!
//! A surface holds exactly one full document at a time. Every update replaces
//! it wholesale. Updates are tagged with a per-surface generation; a finished
//! update only commits if it is still the newest request for a surface that is
//! still mounted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compiler::{compile, CompiledDocument};
use crate::models::{ResumeContent, StyleRules};
use crate::sandbox::shell::DocumentShell;

/// Host-side failure while producing a surface document. Shown inside the
/// surface as a diagnostic, never returned to the caller.
#[derive(Debug, Error)]
pub enum RenderRuntimeError {
    #[error("Rendering task failed: {0}")]
    ShellTask(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RenderSurfaceHandle {
    id: Uuid,
}

impl RenderSurfaceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A reserved update slot. Obtained before the document is built and redeemed
/// with [`SandboxHost::commit`].
#[derive(Debug)]
pub struct UpdateTicket {
    handle: RenderSurfaceHandle,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Committed { generation: u64, revision: u64 },
    /// A newer update was requested before this one finished.
    Superseded { generation: u64 },
    /// The surface was unmounted before this update finished.
    Unmounted,
}

/// Result of rendering resume content into a surface. `diagnostic` is set when
/// the content could not be compiled and the surface shows the error instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
    pub diagnostic: Option<String>,
}

/// The document currently shown by a surface.
#[derive(Debug, Clone)]
pub struct SurfaceSnapshot {
    pub document: Arc<str>,
    pub generation: u64,
    /// Increments on every commit.
    pub revision: u64,
}

struct SurfaceSlot {
    /// Newest generation handed out.
    requested: u64,
    committed: Option<SurfaceSnapshot>,
}

/// Owns all mounted surfaces. Cheap to clone.
#[derive(Clone)]
pub struct SandboxHost {
    shell: Arc<DocumentShell>,
    surfaces: Arc<Mutex<HashMap<Uuid, SurfaceSlot>>>,
}

impl SandboxHost {
    pub fn new(shell: Arc<DocumentShell>) -> Self {
        Self {
            shell,
            surfaces: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn shell(&self) -> &Arc<DocumentShell> {
        &self.shell
    }

    pub fn mount(&self) -> RenderSurfaceHandle {
        let handle = RenderSurfaceHandle { id: Uuid::new_v4() };
        self.slots().insert(
            handle.id,
            SurfaceSlot {
                requested: 0,
                committed: None,
            },
        );
        info!(surface = %handle.id, "Render surface mounted");
        handle
    }

    /// Destroys the surface. In-flight updates for it are discarded on completion.
    pub fn unmount(&self, handle: RenderSurfaceHandle) -> bool {
        let removed = self.slots().remove(&handle.id).is_some();
        if removed {
            info!(surface = %handle.id, "Render surface unmounted");
        }
        removed
    }

    /// Wraps `doc` in the interactive shell and replaces the whole surface
    /// document with it.
    pub async fn update(&self, handle: RenderSurfaceHandle, doc: CompiledDocument) -> UpdateOutcome {
        let Some(ticket) = self.begin(handle) else {
            return UpdateOutcome::Unmounted;
        };

        let shell = Arc::clone(&self.shell);
        let document = match tokio::task::spawn_blocking(move || shell.interactive(&doc)).await {
            Ok(document) => document,
            Err(e) => {
                let error = RenderRuntimeError::ShellTask(e.to_string());
                warn!(surface = %handle.id, "{error}");
                self.shell.diagnostic(&error.to_string())
            }
        };

        self.commit(ticket, document)
    }

    /// Compiles `content` and replaces the surface with it, or with a
    /// diagnostic when it does not compile. The generation is reserved before
    /// compiling, so a slow compile never overwrites a newer one.
    pub async fn render(
        &self,
        handle: RenderSurfaceHandle,
        content: ResumeContent,
        rules: StyleRules,
    ) -> RenderReport {
        let Some(ticket) = self.begin(handle) else {
            return RenderReport {
                outcome: UpdateOutcome::Unmounted,
                diagnostic: None,
            };
        };

        let shell = Arc::clone(&self.shell);
        let built = tokio::task::spawn_blocking(move || match compile(&content, &rules) {
            Ok(doc) => (shell.interactive(&doc), None),
            Err(e) => {
                let message = e.to_string();
                (shell.diagnostic(&message), Some(message))
            }
        })
        .await;

        let (document, diagnostic) = match built {
            Ok(built) => built,
            Err(e) => {
                let error = RenderRuntimeError::ShellTask(e.to_string());
                warn!(surface = %handle.id, "{error}");
                (self.shell.diagnostic(&error.to_string()), Some(error.to_string()))
            }
        };
        if let Some(message) = &diagnostic {
            debug!(surface = %handle.id, "Showing diagnostic: {message}");
        }

        RenderReport {
            outcome: self.commit(ticket, document),
            diagnostic,
        }
    }

    /// Reserves the next generation for `handle`, or `None` if it is not mounted.
    pub fn begin(&self, handle: RenderSurfaceHandle) -> Option<UpdateTicket> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&handle.id)?;
        slot.requested += 1;
        Some(UpdateTicket {
            handle,
            generation: slot.requested,
        })
    }

    /// Installs `document` if the ticket is still the newest request.
    pub fn commit(&self, ticket: UpdateTicket, document: String) -> UpdateOutcome {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&ticket.handle.id) else {
            debug!(surface = %ticket.handle.id, "Discarding update for unmounted surface");
            return UpdateOutcome::Unmounted;
        };

        if ticket.generation != slot.requested {
            debug!(
                surface = %ticket.handle.id,
                generation = ticket.generation,
                latest = slot.requested,
                "Discarding superseded surface update"
            );
            return UpdateOutcome::Superseded {
                generation: ticket.generation,
            };
        }

        let revision = slot.committed.as_ref().map_or(0, |s| s.revision) + 1;
        slot.committed = Some(SurfaceSnapshot {
            document: Arc::from(document),
            generation: ticket.generation,
            revision,
        });
        debug!(surface = %ticket.handle.id, generation = ticket.generation, revision, "Surface content replaced");

        UpdateOutcome::Committed {
            generation: ticket.generation,
            revision,
        }
    }

    /// The current document, if anything has been committed yet.
    pub fn snapshot(&self, handle: RenderSurfaceHandle) -> Option<SurfaceSnapshot> {
        self.slots().get(&handle.id)?.committed.clone()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Uuid, SurfaceSlot>> {
        // A panic while holding this lock cannot leave a slot half-written, so
        // recover the map instead of propagating the poison.
        self.surfaces.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
