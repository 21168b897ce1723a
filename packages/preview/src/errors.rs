use abkit_changes::ValidationError;
use thiserror::Error;

pub type PreviewResult<T> = Result<T, PreviewError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreviewError {
    #[error("Invalid variant: {0}")]
    Variant(#[from] ValidationError),
}
