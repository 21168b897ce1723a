//! Error types for change records

use crate::ChangeType;
use abkit_dom::SelectorError;
use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown change type '{0}'")]
    UnknownType(String),

    #[error("Unknown trigger '{0}'")]
    UnknownTrigger(String),

    #[error("Unknown position '{0}'")]
    UnknownPosition(String),

    #[error("Selector is empty")]
    EmptySelector,

    #[error("Invalid selector '{selector}': {source}")]
    InvalidSelector {
        selector: String,
        source: SelectorError,
    },

    #[error("Invalid {change_type} value: {reason}")]
    InvalidValue {
        change_type: ChangeType,
        reason: String,
    },

    #[error("Invalid {kind} id '{id}': must be non-empty without whitespace or '/'")]
    InvalidId { kind: &'static str, id: String },

    #[error("Change {index}: {source}")]
    InChange {
        index: usize,
        source: Box<ValidationError>,
    },

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn invalid_value(change_type: ChangeType, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            change_type,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::Malformed(e.to_string())
    }
}
