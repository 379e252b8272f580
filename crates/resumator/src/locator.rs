use tracing::debug;

use crate::backend::HostBackend;
use crate::element::HostElement;
use crate::errors::HostError;
use crate::selector::Selector;
use std::collections::HashSet;
use std::sync::Arc;

/// A high-level API for finding elements in the host tree.
///
/// A locator holds a selector, never node references: every call re-queries
/// the live tree, so matches from a previous render pass can never be acted
/// on. All lookups are synchronous and bounded by the size of the tree; the
/// caller owns any retry cadence.
#[derive(Clone)]
pub struct Locator {
    backend: Arc<dyn HostBackend>,
    selector: Selector,
    root: Option<HostElement>,
}

impl Locator {
    pub(crate) fn new(backend: Arc<dyn HostBackend>, selector: Selector) -> Self {
        Self {
            backend,
            selector,
            root: None,
        }
    }

    /// Set the root element for this locator; matches are descendants of it.
    pub fn within(mut self, element: HostElement) -> Self {
        self.root = Some(element);
        self
    }

    /// Get all elements matching this locator, in tree (document) order.
    pub fn all(&self) -> Result<Vec<HostElement>, HostError> {
        let root = match &self.root {
            Some(r) => r.clone(),
            None => HostElement::new(self.backend.clone(), self.backend.root_id()),
        };
        if !root.is_attached() {
            // The scope itself went away mid-render; nothing matches now.
            return Ok(Vec::new());
        }
        self.resolve(&self.selector, &root)
    }

    /// First match, or [`HostError::ElementNotFound`].
    pub fn first(&self) -> Result<HostElement, HostError> {
        debug!(selector = %self.selector, "resolving first match");
        self.all()?.into_iter().next().ok_or_else(|| {
            HostError::ElementNotFound(format!("No elements found for selector {}", self.selector))
        })
    }

    /// The n-th match; negative indices count from the end (`-1` = last).
    pub fn nth(&self, index: isize) -> Result<HostElement, HostError> {
        let elements = self.all()?;
        if elements.is_empty() {
            return Err(HostError::ElementNotFound(format!(
                "No elements found for selector {}",
                self.selector
            )));
        }

        let positive_index: usize = if index >= 0 {
            index as usize
        } else {
            let abs = index.unsigned_abs();
            if abs > elements.len() {
                return Err(HostError::InvalidArgument(format!(
                    "nth index {} is out of bounds for {} elements",
                    index,
                    elements.len()
                )));
            }
            elements.len() - abs
        };

        elements.get(positive_index).cloned().ok_or_else(|| {
            HostError::InvalidArgument(format!(
                "nth index {} is out of bounds for {} elements",
                index,
                elements.len()
            ))
        })
    }

    /// Whether any element currently matches.
    pub fn exists(&self) -> Result<bool, HostError> {
        Ok(!self.all()?.is_empty())
    }

    /// Get a nested locator, chaining onto the current selector.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        self.append_selector(selector.into())
    }

    fn append_selector(&self, selector_to_append: Selector) -> Locator {
        let mut new_chain = match self.selector.clone() {
            Selector::Chain(existing_chain) => existing_chain,
            s => vec![s],
        };

        // Append the new selector, flattening if it's also a chain
        match selector_to_append {
            Selector::Chain(mut next_chain_parts) => {
                new_chain.append(&mut next_chain_parts);
            }
            s => new_chain.push(s),
        }

        Locator {
            backend: self.backend.clone(),
            selector: Selector::Chain(new_chain),
            root: self.root.clone(),
        }
    }

    fn resolve(
        &self,
        selector: &Selector,
        root: &HostElement,
    ) -> Result<Vec<HostElement>, HostError> {
        match selector {
            Selector::Invalid(reason) => Err(HostError::InvalidSelector(reason.clone())),
            Selector::Chain(parts) => {
                let mut scopes = vec![root.clone()];
                for part in parts {
                    let mut next: Vec<HostElement> = Vec::new();
                    let mut seen: HashSet<crate::backend::ElementId> = HashSet::new();
                    for scope in &scopes {
                        for found in self.resolve(part, scope)? {
                            if seen.insert(found.id()) {
                                next.push(found);
                            }
                        }
                    }
                    scopes = next;
                    if scopes.is_empty() {
                        break;
                    }
                }
                Ok(scopes)
            }
            _ => {
                // Depth-first walk of the subtree, excluding the scope itself
                let mut result = Vec::new();
                let mut stack: Vec<HostElement> = root.children()?;
                stack.reverse();
                while let Some(el) = stack.pop() {
                    if el.matches(selector)? {
                        result.push(el.clone());
                    }
                    let mut children = el.children()?;
                    children.reverse();
                    stack.extend(children);
                }
                Ok(result)
            }
        }
    }
}
