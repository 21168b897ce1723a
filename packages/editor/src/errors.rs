//! Error types for the editor

use abkit_changes::ValidationError;
use abkit_dom::{DomError, NodeId, SelectorError};
use thiserror::Error;

pub type ApplyResult<T> = Result<T, ApplyError>;
pub type EditorResult<T> = Result<T, EditorError>;

/// A record that cannot be applied. Raised before any element is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Invalid change: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid selector '{selector}': {source}")]
    Selector {
        selector: String,
        source: SelectorError,
    },

    #[error("Could not parse HTML: {0}")]
    Html(String),

    #[error("Attribute '{0}' is reserved for change markers")]
    ReservedAttribute(String),

    #[error("Cannot move {element:?} relative to {target:?}: target is the element or inside it")]
    InvalidMoveTarget { element: NodeId, target: NodeId },

    #[error("Move target {0:?} has no parent to insert beside")]
    DetachedMoveTarget(NodeId),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}

impl ApplyError {
    pub(crate) fn selector(selector: &str, source: SelectorError) -> Self {
        Self::Selector {
            selector: selector.to_string(),
            source,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    #[error("Invalid change: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}
