use thiserror::Error;

use crate::domain::MinorUnits;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed, missing or out-of-range request fields.
    #[error("{0}")]
    Validation(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The message is fixed; the figures are for logs only.
    #[error("insufficient balance")]
    InsufficientBalance {
        account_number: String,
        available: MinorUnits,
        required: MinorUnits,
    },

    #[error("{0}")]
    Persistence(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}
