//! Analysis errors definition.

use thiserror::Error;
use tw_model::errors::ModelError;
use tw_utils::errors::UtilsError;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("work bag error: {0}")]
    WorkBag(#[from] UtilsError),

    /// Two method contexts with structurally different shapes were asked
    /// to unify (static/non-static or void/non-void mismatch). This is a
    /// configuration error of the call graph or program model, surfaced
    /// immediately rather than masked.
    #[error("incompatible method context shapes: {0}")]
    IncompatibleContextShapes(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("the method has no body")]
    NoBody,
}
