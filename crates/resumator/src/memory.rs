//! In-process implementation of [`HostBackend`].
//!
//! Backs the test suite and embedding simulations: the host tree lives in a
//! `RwLock`-guarded arena, clicks are recorded in a log instead of reaching a
//! real UI, and every structural change is published as a [`MutationBatch`]
//! so the re-injection path can be exercised end to end.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::backend::{ElementId, ElementSpec, HostBackend, HostEvent, MutationBatch};
use crate::errors::HostError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Node {
    role: String,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

struct Arena {
    nodes: HashMap<ElementId, Node>,
    next_id: u64,
    root: ElementId,
}

impl Arena {
    fn get(&self, id: ElementId) -> Result<&Node, HostError> {
        self.nodes.get(&id).ok_or(HostError::Detached(id))
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut Node, HostError> {
        self.nodes.get_mut(&id).ok_or(HostError::Detached(id))
    }

    fn alloc(&mut self, spec: ElementSpec, parent: Option<ElementId>) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                role: spec.role,
                attrs: spec.attrs,
                text: spec.text,
                parent,
                children: Vec::new(),
            },
        );
        id
    }

    fn collect_text(&self, id: ElementId, out: &mut String) {
        if let Ok(node) = self.get(id) {
            if let Some(text) = &node.text {
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(text);
            }
            for child in &node.children {
                self.collect_text(*child, out);
            }
        }
    }

    fn detach_subtree(&mut self, id: ElementId, removed: &mut Vec<ElementId>) {
        if let Some(node) = self.nodes.remove(&id) {
            removed.push(id);
            for child in node.children {
                self.detach_subtree(child, removed);
            }
        }
    }
}

/// An in-memory host tree.
pub struct MemoryHost {
    arena: RwLock<Arena>,
    clicks: Mutex<Vec<ElementId>>,
    events: broadcast::Sender<HostEvent>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a host with an empty root (role "document").
    pub fn new() -> Self {
        let root = ElementId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                role: "document".to_string(),
                attrs: BTreeMap::new(),
                text: None,
                parent: None,
                children: Vec::new(),
            },
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            arena: RwLock::new(Arena {
                nodes,
                next_id: 1,
                root,
            }),
            clicks: Mutex::new(Vec::new()),
            events,
        }
    }

    /// All clicks delivered so far, oldest first.
    pub fn clicks(&self) -> Vec<ElementId> {
        self.clicks.lock().expect("click log poisoned").clone()
    }

    pub fn clear_clicks(&self) {
        self.clicks.lock().expect("click log poisoned").clear();
    }

    fn publish(&self, event: HostEvent) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Arena> {
        self.arena.read().expect("host tree lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Arena> {
        self.arena.write().expect("host tree lock poisoned")
    }
}

impl HostBackend for MemoryHost {
    fn root_id(&self) -> ElementId {
        self.read().root
    }

    fn is_attached(&self, id: ElementId) -> bool {
        self.read().nodes.contains_key(&id)
    }

    fn role(&self, id: ElementId) -> Result<String, HostError> {
        Ok(self.read().get(id)?.role.clone())
    }

    fn attr(&self, id: ElementId, name: &str) -> Result<Option<String>, HostError> {
        Ok(self.read().get(id)?.attrs.get(name).cloned())
    }

    fn own_text(&self, id: ElementId) -> Result<Option<String>, HostError> {
        Ok(self.read().get(id)?.text.clone())
    }

    fn text_content(&self, id: ElementId) -> Result<String, HostError> {
        let arena = self.read();
        arena.get(id)?;
        let mut out = String::new();
        arena.collect_text(id, &mut out);
        Ok(out)
    }

    fn parent(&self, id: ElementId) -> Result<Option<ElementId>, HostError> {
        Ok(self.read().get(id)?.parent)
    }

    fn children(&self, id: ElementId) -> Result<Vec<ElementId>, HostError> {
        Ok(self.read().get(id)?.children.clone())
    }

    fn click(&self, id: ElementId) -> Result<(), HostError> {
        self.read().get(id)?;
        self.clicks.lock().expect("click log poisoned").push(id);
        debug!(?id, "click delivered");
        self.publish(HostEvent::Clicked(id));
        Ok(())
    }

    fn set_attr(&self, id: ElementId, name: &str, value: &str) -> Result<(), HostError> {
        self.write()
            .get_mut(id)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn append_child(&self, parent: ElementId, spec: ElementSpec) -> Result<ElementId, HostError> {
        let id = {
            let mut arena = self.write();
            arena.get(parent)?;
            let id = arena.alloc(spec, Some(parent));
            arena.get_mut(parent)?.children.push(id);
            id
        };
        self.publish(HostEvent::Mutations(MutationBatch {
            added: vec![id],
            removed: Vec::new(),
        }));
        Ok(id)
    }

    fn insert_before(
        &self,
        parent: ElementId,
        spec: ElementSpec,
        sibling: ElementId,
    ) -> Result<ElementId, HostError> {
        let id = {
            let mut arena = self.write();
            let position = arena
                .get(parent)?
                .children
                .iter()
                .position(|c| *c == sibling)
                .ok_or_else(|| {
                    HostError::InvalidArgument(format!(
                        "{sibling:?} is not a child of {parent:?}"
                    ))
                })?;
            let id = arena.alloc(spec, Some(parent));
            arena.get_mut(parent)?.children.insert(position, id);
            id
        };
        self.publish(HostEvent::Mutations(MutationBatch {
            added: vec![id],
            removed: Vec::new(),
        }));
        Ok(id)
    }

    fn remove(&self, id: ElementId) -> Result<(), HostError> {
        let removed = {
            let mut arena = self.write();
            if arena.root == id {
                return Err(HostError::InvalidArgument(
                    "cannot remove the root element".to_string(),
                ));
            }
            let parent = arena.get(id)?.parent;
            if let Some(parent) = parent {
                if let Ok(node) = arena.get_mut(parent) {
                    node.children.retain(|c| *c != id);
                }
            }
            let mut removed = Vec::new();
            arena.detach_subtree(id, &mut removed);
            removed
        };
        self.publish(HostEvent::Mutations(MutationBatch {
            added: Vec::new(),
            removed,
        }));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}
