use questlog_core::CoreError;
use questlog_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Caller mistakes and insufficient funds: rejected with no state change.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Core(e) => e.is_validation() || matches!(e, CoreError::InsufficientFunds { .. }),
            _ => false,
        }
    }
}
