//! Global `ThreadWorks` errors definition.

use thiserror::Error;

pub type TwResult<T> = Result<T, TwError>;

#[derive(Debug, Error)]
pub enum TwError {
    #[error("model error: {0}")]
    Model(#[from] tw_model::errors::ModelError),

    #[error("analysis error: {0}")]
    Analysis(#[from] tw_analysis::errors::AnalysisError),

    #[error("utils error: {0}")]
    Utils(#[from] tw_utils::errors::UtilsError),
}
