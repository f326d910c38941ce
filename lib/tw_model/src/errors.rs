//! Program model errors definition.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("duplicate class in program: {0}")]
    DuplicateClass(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("invalid type descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("local slot out of bounds: {0}")]
    OutOfBoundsLocal(String),
}
