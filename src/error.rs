//! Errors surfaced by user-visible commands

use crate::ai::GenerationError;
use crate::billing::{LimitDenialReason, MeteringError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Metering(#[from] MeteringError),

    #[error("{0}")]
    LimitReached(LimitDenialReason),

    #[error("only the operator account can change plans")]
    Unauthorized,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("credential error: {0}")]
    Credentials(String),
}

impl AppError {
    /// Whether a retry with the same input could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Generation(GenerationError::Transport(_))
                | Self::Generation(GenerationError::Api { status: 429, .. })
        ) || matches!(self, Self::Generation(GenerationError::Api { status, .. }) if *status >= 500)
    }
}
