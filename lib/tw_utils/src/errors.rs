//! Utilities errors definition.

use thiserror::Error;

pub type UtilsResult<T> = Result<T, UtilsError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UtilsError {
    #[error("no work left in the work bag")]
    EmptyWorkBag,
}
