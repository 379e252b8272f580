use crate::backend::ElementId;

/// Errors surfaced by host-tree lookups and actions.
///
/// The watcher treats every one of these as "condition not currently
/// detectable" and retries on the next tick; nothing here is fatal to the
/// recovery loop.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element {0:?} is detached from the host tree")]
    Detached(ElementId),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
