use std::fmt;
use std::sync::Arc;

use crate::backend::{ElementId, ElementSpec, HostBackend};
use crate::errors::HostError;
use crate::locator::Locator;
use crate::selector::Selector;
use crate::utils::normalize_label;

/// A handle to one element in the host tree.
///
/// Handles are cheap to clone and never keep the underlying node alive: the
/// host owns its tree, and a handle whose node has been re-rendered away
/// fails with [`HostError::Detached`] on the next use.
#[derive(Clone)]
pub struct HostElement {
    backend: Arc<dyn HostBackend>,
    id: ElementId,
}

impl fmt::Debug for HostElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostElement").field("id", &self.id).finish()
    }
}

impl PartialEq for HostElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl HostElement {
    pub fn new(backend: Arc<dyn HostBackend>, id: ElementId) -> Self {
        Self { backend, id }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn HostBackend> {
        &self.backend
    }

    pub fn is_attached(&self) -> bool {
        self.backend.is_attached(self.id)
    }

    pub fn role(&self) -> Result<String, HostError> {
        self.backend.role(self.id)
    }

    pub fn attr(&self, name: &str) -> Result<Option<String>, HostError> {
        self.backend.attr(self.id, name)
    }

    /// The element's own text, excluding descendants.
    pub fn own_text(&self) -> Result<Option<String>, HostError> {
        self.backend.own_text(self.id)
    }

    /// Concatenated text of the element and all descendants.
    pub fn text(&self) -> Result<String, HostError> {
        self.backend.text_content(self.id)
    }

    pub fn parent(&self) -> Result<Option<HostElement>, HostError> {
        Ok(self
            .backend
            .parent(self.id)?
            .map(|id| HostElement::new(self.backend.clone(), id)))
    }

    pub fn children(&self) -> Result<Vec<HostElement>, HostError> {
        Ok(self
            .backend
            .children(self.id)?
            .into_iter()
            .map(|id| HostElement::new(self.backend.clone(), id))
            .collect())
    }

    pub fn click(&self) -> Result<(), HostError> {
        self.backend.click(self.id)
    }

    pub fn set_attr(&self, name: &str, value: &str) -> Result<(), HostError> {
        self.backend.set_attr(self.id, name, value)
    }

    pub fn append(&self, spec: ElementSpec) -> Result<HostElement, HostError> {
        let id = self.backend.append_child(self.id, spec)?;
        Ok(HostElement::new(self.backend.clone(), id))
    }

    pub fn remove(&self) -> Result<(), HostError> {
        self.backend.remove(self.id)
    }

    /// A locator rooted at this element.
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.backend.clone(), selector.into()).within(self.clone())
    }

    /// Walk up the ancestor chain (starting from this element) until a node
    /// matches `selector`. Mirrors DOM `closest()`.
    pub fn closest(&self, selector: &Selector) -> Result<Option<HostElement>, HostError> {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if el.matches(selector)? {
                return Ok(Some(el));
            }
            current = el.parent()?;
        }
        Ok(None)
    }

    /// Whether this element itself satisfies `selector`.
    ///
    /// `Chain` is resolved by [`Locator`], not here; a chain reaching this
    /// method is a usage error.
    pub fn matches(&self, selector: &Selector) -> Result<bool, HostError> {
        match selector {
            Selector::Role(role) => Ok(self.role()?.eq_ignore_ascii_case(role)),
            Selector::ClassContains(class) => Ok(self
                .attr("class")?
                .map(|c| c.contains(class.as_str()))
                .unwrap_or(false)),
            Selector::TextContains(text) => Ok(self.text()?.contains(text.as_str())),
            Selector::LabelEquals(label) => {
                Ok(normalize_label(&self.text()?) == normalize_label(label))
            }
            Selector::Attr { name, value } => match (self.attr(name)?, value) {
                (Some(actual), Some(expected)) => Ok(actual.contains(expected.as_str())),
                (Some(_), None) => Ok(true),
                (None, _) => Ok(false),
            },
            Selector::Has(inner) => Ok(!self.locator((**inner).clone()).all()?.is_empty()),
            Selector::And(parts) => {
                for part in parts {
                    if !self.matches(part)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Selector::Or(parts) => {
                for part in parts {
                    if self.matches(part)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Selector::Chain(_) => Err(HostError::InvalidSelector(
                "chained selectors cannot be matched against a single element".to_string(),
            )),
            Selector::Invalid(reason) => Err(HostError::InvalidSelector(reason.clone())),
        }
    }
}
