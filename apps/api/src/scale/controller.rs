//! Scale controller: keeps a preview's fit-to-width factor current.
//!
//! [`LayoutSignals`] are the observable layout inputs of one preview (container
//! width, natural sheet size, window resize events). A [`ScaleController`]
//! registers an observer task on them and publishes a [`ScaleState`] only when
//! the factor or sheet actually changes. The observer is released when the
//! controller is shut down or dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::scale::factor::{compute_scale, ScaleFactor};

const WINDOW_EVENT_CAPACITY: usize = 16;

/// Natural (unscaled) size of the rendered sheet, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SheetSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tagged<T> {
    value: T,
    revision: u64,
}

/// Layout inputs for one preview. Every emitted signal gets a revision number
/// that [`ScaleController::settled`] can wait on.
pub struct LayoutSignals {
    revision: AtomicU64,
    container: watch::Sender<Tagged<f64>>,
    sheet: watch::Sender<Tagged<SheetSize>>,
    window: broadcast::Sender<u64>,
}

impl LayoutSignals {
    /// Starts with an unmeasured (zero-width) container.
    pub fn new(sheet: SheetSize) -> Self {
        let (container, _) = watch::channel(Tagged {
            value: 0.0,
            revision: 0,
        });
        let (sheet, _) = watch::channel(Tagged {
            value: sheet,
            revision: 0,
        });
        let (window, _) = broadcast::channel(WINDOW_EVENT_CAPACITY);
        Self {
            revision: AtomicU64::new(0),
            container,
            sheet,
            window,
        }
    }

    pub fn resize_container(&self, width: f64) -> u64 {
        let revision = self.next_revision();
        self.container.send_replace(Tagged {
            value: width,
            revision,
        });
        revision
    }

    pub fn resize_sheet(&self, size: SheetSize) -> u64 {
        let revision = self.next_revision();
        self.sheet.send_replace(Tagged {
            value: size,
            revision,
        });
        revision
    }

    pub fn window_resized(&self) -> u64 {
        let revision = self.next_revision();
        // No observer registered is not an error; the event is simply unseen.
        let _ = self.window.send(revision);
        revision
    }

    /// The most recently signalled sheet size, whether or not it has been
    /// measured against a container yet.
    pub fn sheet(&self) -> SheetSize {
        self.sheet.borrow().value
    }

    /// Number of observers currently registered on the container.
    pub fn observer_count(&self) -> usize {
        self.container.receiver_count()
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// The factor from the latest successful measurement, together with the
/// newest signalled sheet size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleState {
    pub factor: ScaleFactor,
    pub sheet: SheetSize,
    /// False until a measurable container width has been seen.
    pub measured: bool,
}

/// How the host applies the factor: a visual transform anchored at the top-left
/// corner. Logical sizes are the untransformed ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub transform: String,
    pub transform_origin: &'static str,
    pub logical_width: f64,
    pub logical_height: f64,
    pub scaled_width: f64,
    pub scaled_height: f64,
}

impl ScaleState {
    pub fn presentation(&self) -> Presentation {
        Presentation {
            transform: self.factor.css_transform(),
            transform_origin: "top left",
            logical_width: self.sheet.width,
            logical_height: self.sheet.height,
            scaled_width: self.factor.apply(self.sheet.width),
            scaled_height: self.factor.apply(self.sheet.height),
        }
    }
}

pub struct ScaleController {
    state: watch::Receiver<ScaleState>,
    acks: watch::Receiver<u64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ScaleController {
    /// Registers an observer on `signals` and performs the initial measurement.
    /// Must be called from within a Tokio runtime.
    pub fn observe(signals: &LayoutSignals) -> Self {
        let container = signals.container.subscribe();
        let sheet = signals.sheet.subscribe();
        let window = signals.window.subscribe();

        let initial = ScaleState {
            factor: ScaleFactor::IDENTITY,
            sheet: sheet.borrow().value,
            measured: false,
        };
        let (state_tx, state) = watch::channel(initial);
        let (ack_tx, acks) = watch::channel(0);

        let task = tokio::spawn(run_observer(container, sheet, window, state_tx, ack_tx));

        Self {
            state,
            acks,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn current(&self) -> ScaleState {
        *self.state.borrow()
    }

    /// Waits until the observer has processed every signal up to `revision`,
    /// then returns the current state. Returns immediately once torn down.
    pub async fn settled(&self, revision: u64) -> ScaleState {
        let mut acks = self.acks.clone();
        // An error means the observer is gone; the last published state stands.
        let _ = acks.wait_for(|seen| *seen >= revision).await;
        self.current()
    }

    /// Unregisters the observer and waits for it to be released.
    pub async fn shutdown(&self) {
        let task = self.take_task();
        if let Some(task) = task {
            task.abort();
            // Cancellation is the expected outcome here.
            let _ = task.await;
            debug!("Scale observer released");
        }
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Drop for ScaleController {
    fn drop(&mut self) {
        if let Some(task) = self.take_task() {
            task.abort();
        }
    }
}

async fn run_observer(
    mut container: watch::Receiver<Tagged<f64>>,
    mut sheet: watch::Receiver<Tagged<SheetSize>>,
    mut window: broadcast::Receiver<u64>,
    state: watch::Sender<ScaleState>,
    acks: watch::Sender<u64>,
) {
    let mut seen = recompute(&mut container, &mut sheet, &state);
    acks.send_replace(seen);

    loop {
        let window_revision = tokio::select! {
            changed = container.changed() => {
                if changed.is_err() {
                    break;
                }
                0
            }
            changed = sheet.changed() => {
                if changed.is_err() {
                    break;
                }
                0
            }
            event = window.recv() => match event {
                Ok(revision) => revision,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Window resize events lagged");
                    0
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let revision = recompute(&mut container, &mut sheet, &state);
        seen = seen.max(revision).max(window_revision);
        acks.send_replace(seen);
    }
}

/// Measures once and publishes if the result differs. An unmeasurable
/// container keeps the previous factor but still carries the new sheet size.
/// Returns the newest signal revision the measurement reflects.
fn recompute(
    container: &mut watch::Receiver<Tagged<f64>>,
    sheet: &mut watch::Receiver<Tagged<SheetSize>>,
    state: &watch::Sender<ScaleState>,
) -> u64 {
    let container = *container.borrow_and_update();
    let sheet = *sheet.borrow_and_update();

    let factor = match compute_scale(container.value, sheet.value.width) {
        Ok(factor) => Some(factor),
        Err(e) => {
            debug!("Skipping scale measurement: {e}");
            None
        }
    };

    let changed = state.send_if_modified(|current| {
        let next = match factor {
            Some(factor) => ScaleState {
                factor,
                sheet: sheet.value,
                measured: true,
            },
            None => ScaleState {
                sheet: sheet.value,
                ..*current
            },
        };
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        debug!(
            factor = state.borrow().factor.value(),
            container = container.value,
            sheet_width = sheet.value.width,
            sheet_height = sheet.value.height,
            "Scale state updated"
        );
    }

    container.revision.max(sheet.revision)
}
