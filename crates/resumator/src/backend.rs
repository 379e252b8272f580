//! The seam between the watchdog and the host application's UI tree.
//!
//! The host tree is a live, mutable structure the library does not control:
//! containers appear, disappear and get replaced at arbitrary times. Every
//! read here answers for the tree *as it is right now*; callers must not
//! cache structural answers across ticks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

use crate::errors::HostError;

/// Opaque identifier for a node in the host tree.
///
/// Ids are never reused within a backend's lifetime, so a stale id held
/// across a re-render fails lookups with [`HostError::Detached`] instead of
/// silently addressing a different node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Description of an element to be created in the host tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementSpec {
    pub role: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Append to the `class` attribute (space separated, DOM style).
    pub fn class(mut self, class: impl AsRef<str>) -> Self {
        let entry = self.attrs.entry("class".to_string()).or_default();
        if entry.is_empty() {
            entry.push_str(class.as_ref());
        } else {
            entry.push(' ');
            entry.push_str(class.as_ref());
        }
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A batch of structural change descriptors, in the order they happened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationBatch {
    #[serde(default)]
    pub added: Vec<ElementId>,
    #[serde(default)]
    pub removed: Vec<ElementId>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Notifications emitted by a backend as the host tree changes.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Structural changes (nodes added/removed anywhere in the tree).
    Mutations(MutationBatch),
    /// A pointer click was delivered to the given element.
    Clicked(ElementId),
}

/// Access to a host application's UI tree.
///
/// Implementations must keep every method synchronous and bounded: the
/// watcher calls them from a timer tick and relies on lookups degrading to
/// an `Err` (never blocking, never panicking) when the host is mid-render.
pub trait HostBackend: Send + Sync {
    /// The root of the host tree. Always present.
    fn root_id(&self) -> ElementId;

    /// Whether the node is still attached to the tree.
    fn is_attached(&self, id: ElementId) -> bool;

    fn role(&self, id: ElementId) -> Result<String, HostError>;

    fn attr(&self, id: ElementId, name: &str) -> Result<Option<String>, HostError>;

    /// The element's own text, excluding descendants.
    fn own_text(&self, id: ElementId) -> Result<Option<String>, HostError>;

    /// Concatenated text of the element and all descendants, in tree order.
    fn text_content(&self, id: ElementId) -> Result<String, HostError>;

    fn parent(&self, id: ElementId) -> Result<Option<ElementId>, HostError>;

    fn children(&self, id: ElementId) -> Result<Vec<ElementId>, HostError>;

    /// Deliver a pointer click to the element.
    fn click(&self, id: ElementId) -> Result<(), HostError>;

    fn set_attr(&self, id: ElementId, name: &str, value: &str) -> Result<(), HostError>;

    /// Create a new element from `spec` and append it under `parent`.
    fn append_child(&self, parent: ElementId, spec: ElementSpec) -> Result<ElementId, HostError>;

    /// Create a new element from `spec` and insert it under `parent`,
    /// immediately before `sibling`.
    fn insert_before(
        &self,
        parent: ElementId,
        spec: ElementSpec,
        sibling: ElementId,
    ) -> Result<ElementId, HostError>;

    /// Detach the element (and its subtree) from the tree.
    fn remove(&self, id: ElementId) -> Result<(), HostError>;

    /// Subscribe to change notifications. Receivers that fall behind see a
    /// lagged error and should resynchronize by re-querying the live tree.
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}
