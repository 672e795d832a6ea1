//! Top-level error aggregation (§7): everything a crate boundary inside the
//! pipeline can raise, rolled up into one type the CLI matches on for exit
//! codes.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Analysis(#[from] ca_error::AnalysisError),

    #[error("cancelled")]
    Cancelled,

    #[error("failed to write result artifact {path}: {source}")]
    ResultWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ca_cancel::CancelledError> for EngineError {
    fn from(_: ca_cancel::CancelledError) -> Self {
        EngineError::Cancelled
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
