//! Auto-recovery watchdog for chat-style IDE agent UIs.
//!
//! The host application renders an agent conversation that occasionally
//! pauses on recoverable states: tool-call limits and transient provider
//! errors, each surfaced only as text next to a resume/retry control. This
//! crate watches the host UI tree, classifies those states from their text,
//! and drives idempotent recovery clicks gated by a cooldown. A toggle
//! control injected into the host toolbar lets the user arm or disarm it.
//!
//! The host tree is consumed through the [`backend::HostBackend`] seam;
//! [`memory::MemoryHost`] is the in-process implementation used for tests
//! and simulations.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub mod backend;
pub mod conditions;
pub mod element;
pub mod errors;
pub mod locator;
pub mod memory;
pub mod selector;
pub mod state;
#[cfg(test)]
mod tests;
pub mod toggle;
pub mod utils;
pub mod watcher;

pub use backend::{ElementId, ElementSpec, HostBackend, HostEvent, MutationBatch};
pub use conditions::{ScanOutcome, TransientRule, TRANSIENT_RULES};
pub use element::HostElement;
pub use errors::HostError;
pub use locator::Locator;
pub use memory::MemoryHost;
pub use selector::Selector;
pub use state::ScriptState;
pub use toggle::ToggleControl;
pub use tokio_util::sync::CancellationToken;
pub use watcher::{Watcher, ACTION_COOLDOWN, SCAN_INTERVAL};

/// The main entry point: wires the toggle control and the detection loop
/// onto a host backend.
pub struct Autopilot {
    backend: Arc<dyn HostBackend>,
    state: Arc<ScriptState>,
    toggle: Arc<ToggleControl>,
}

impl Autopilot {
    pub fn new(backend: Arc<dyn HostBackend>) -> Self {
        let state = Arc::new(ScriptState::new());
        let toggle = Arc::new(ToggleControl::new(backend.clone(), state.clone()));
        Self {
            backend,
            state,
            toggle,
        }
    }

    pub fn state(&self) -> &Arc<ScriptState> {
        &self.state
    }

    pub fn toggle(&self) -> &Arc<ToggleControl> {
        &self.toggle
    }

    /// The root element of the host tree.
    pub fn root(&self) -> HostElement {
        HostElement::new(self.backend.clone(), self.backend.root_id())
    }

    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.backend.clone(), selector.into())
    }

    /// A watcher sharing this instance's state, for driving ticks manually.
    pub fn watcher(&self) -> Watcher {
        Watcher::new(self.backend.clone(), self.state.clone())
    }

    /// Start the three triggers:
    ///
    /// 1. the initial-injection retry timer, which self-cancels once the
    ///    toggle control has been inserted;
    /// 2. the host-event task, which re-injects the toggle after relevant
    ///    mutation batches and routes clicks on the control to its handler;
    /// 3. the fixed-interval detection scan.
    pub fn spawn(&self) -> AutopilotHandle {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        // 1. Initial injection, retried until it first succeeds.
        {
            let toggle = self.toggle.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(toggle::INJECT_RETRY_INTERVAL);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            match toggle.reinsert() {
                                Ok(true) => break,
                                Ok(false) => {}
                                Err(e) => debug!(error = %e, "toggle injection attempt failed"),
                            }
                        }
                    }
                }
            }));
        }

        // 2. Change-notification subscription: re-injection and click routing.
        {
            let toggle = self.toggle.clone();
            let cancel = cancel.clone();
            let mut events = self.backend.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        event = events.recv() => match event {
                            Ok(HostEvent::Clicked(id)) => toggle.handle_click(id),
                            Ok(HostEvent::Mutations(batch)) => {
                                if toggle.needs_reinsert(&batch).unwrap_or(false) {
                                    // Give the host tree a moment to settle.
                                    tokio::time::sleep(toggle::REINJECT_SETTLE_DELAY).await;
                                    match toggle.reinsert() {
                                        Ok(_) => {}
                                        Err(e) => debug!(error = %e, "toggle re-injection failed"),
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "host event stream lagged; resynchronizing");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }));
        }

        // 3. The detection & recovery loop.
        tasks.push(tokio::spawn(self.watcher().run(cancel.clone())));

        AutopilotHandle { cancel, tasks }
    }
}

/// Handle to a running [`Autopilot`], for cooperative shutdown.
pub struct AutopilotHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AutopilotHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all tasks and wait for them to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
