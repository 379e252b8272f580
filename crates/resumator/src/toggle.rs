//! The user-facing on/off control, injected into the host toolbar.
//!
//! The host re-renders its toolbar away at arbitrary times, so the control
//! is re-inserted whenever a mutation batch touches the toolbar or the
//! control is found missing. Injection is idempotent: stale instances are
//! removed before a fresh one goes in.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{ElementId, ElementSpec, HostBackend, MutationBatch};
use crate::element::HostElement;
use crate::errors::HostError;
use crate::locator::Locator;
use crate::selector::Selector;
use crate::state::ScriptState;

/// Marker class identifying our control in the host tree.
pub const TOGGLE_CLASS: &str = "auto-resume-toggle";

/// Retry cadence for the initial injection, until it first succeeds.
pub const INJECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Grace period after a relevant mutation batch before re-injecting, so the
/// host tree can settle mid-render.
pub const REINJECT_SETTLE_DELAY: Duration = Duration::from_millis(100);

const TOOLBAR_CONTAINER_CLASS: &str = "composer-button-area";
const ICON_BUTTON_CLASS: &str = "anysphere-icon-button";
/// The control is anchored immediately before the toolbar's image button.
const ANCHOR_GLYPH_CLASS: &str = "codicon-image-two";

const TOOLTIP_ON: &str = "Auto-resume is ON - Click to disable";
const TOOLTIP_OFF: &str = "Auto-resume is OFF - Click to enable";

/// The toggle control and its injection lifecycle.
pub struct ToggleControl {
    backend: Arc<dyn HostBackend>,
    state: Arc<ScriptState>,
    node: Mutex<Option<ElementId>>,
}

impl ToggleControl {
    pub fn new(backend: Arc<dyn HostBackend>, state: Arc<ScriptState>) -> Self {
        Self {
            backend,
            state,
            node: Mutex::new(None),
        }
    }

    /// The element spec reflecting the current active state.
    pub fn render(&self) -> ElementSpec {
        let active = self.state.is_active();
        ElementSpec::new("button")
            .class(ICON_BUTTON_CLASS)
            .class(TOGGLE_CLASS)
            .attr("title", if active { TOOLTIP_ON } else { TOOLTIP_OFF })
            .attr("data-active", if active { "true" } else { "false" })
    }

    /// The id of the currently injected instance, if any.
    pub fn node_id(&self) -> Option<ElementId> {
        *self.node.lock().expect("toggle lock poisoned")
    }

    /// Whether an instance of the control currently exists in the tree.
    pub fn is_injected(&self) -> Result<bool, HostError> {
        self.locator(Selector::ClassContains(TOGGLE_CLASS.into()))
            .exists()
    }

    /// Flip the active state and synchronously update the control's
    /// appearance. Side effect only.
    pub fn on_activate(&self) {
        let active = self.state.toggle();
        info!(
            "auto-resume {}",
            if active { "enabled" } else { "disabled" }
        );
        if let Some(id) = self.node_id() {
            let el = HostElement::new(self.backend.clone(), id);
            if el.is_attached() {
                // Appearance refresh is best effort; the state flag is what
                // gates the watcher.
                let _ = el.set_attr("title", if active { TOOLTIP_ON } else { TOOLTIP_OFF });
                let _ = el.set_attr("data-active", if active { "true" } else { "false" });
            }
        }
    }

    /// Route a host click event: flips the state iff the clicked element is
    /// the injected control.
    pub fn handle_click(&self, id: ElementId) {
        if self.node_id() == Some(id) {
            self.on_activate();
        }
    }

    /// Remove any stale instance and insert a fresh control before the
    /// anchor sibling. Returns `Ok(false)` when the toolbar or anchor is
    /// absent in the current host tree; the caller retries later.
    pub fn reinsert(&self) -> Result<bool, HostError> {
        // Both the retry timer and the event task can land here; holding the
        // node lock across remove+insert keeps the instance count at one
        // even on a multi-threaded runtime.
        let mut node = self.node.lock().expect("toggle lock poisoned");

        // Idempotence: never leave two instances behind.
        for stale in self
            .locator(Selector::ClassContains(TOGGLE_CLASS.into()))
            .all()?
        {
            stale.remove()?;
        }
        *node = None;

        let container = match self
            .locator(Selector::ClassContains(TOOLBAR_CONTAINER_CLASS.into()))
            .first()
        {
            Ok(el) => el,
            Err(HostError::ElementNotFound(_)) => {
                debug!("toolbar container not found, will retry");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let anchor = match container
            .locator(Selector::ClassContains(ANCHOR_GLYPH_CLASS.into()))
            .first()
        {
            Ok(glyph) => glyph.closest(&Selector::ClassContains(ICON_BUTTON_CLASS.into()))?,
            Err(HostError::ElementNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let Some(anchor) = anchor else {
            debug!("anchor button not found, will retry");
            return Ok(false);
        };
        let Some(parent) = anchor.parent()? else {
            return Ok(false);
        };

        let id = self
            .backend
            .insert_before(parent.id(), self.render(), anchor.id())?;
        *node = Some(id);
        info!("toggle control injected");
        Ok(true)
    }

    /// Whether a mutation batch warrants re-injection: the toolbar container
    /// was (re)added, or our control is gone.
    pub fn needs_reinsert(&self, batch: &MutationBatch) -> Result<bool, HostError> {
        for added in &batch.added {
            if !self.backend.is_attached(*added) {
                continue;
            }
            let el = HostElement::new(self.backend.clone(), *added);
            let toolbar = Selector::ClassContains(TOOLBAR_CONTAINER_CLASS.into());
            if el.matches(&toolbar)? || el.locator(toolbar).exists()? {
                return Ok(true);
            }
        }
        Ok(!self.is_injected()?)
    }

    fn locator(&self, selector: Selector) -> Locator {
        Locator::new(self.backend.clone(), selector)
    }
}
