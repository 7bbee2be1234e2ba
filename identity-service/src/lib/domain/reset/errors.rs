use auth::PasswordError;
use thiserror::Error;

use crate::domain::errors::StoreError;
use crate::identity::errors::EmailError;

/// Top-level error for password-reset operations
#[derive(Debug, Clone, Error)]
pub enum ResetError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No identity registered with email: {0}")]
    UnknownIdentity(String),

    /// Unknown, expired and already used secrets are not distinguished
    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    // Infrastructure errors
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing failure: {0}")]
    Hashing(#[from] PasswordError),
}

impl ResetError {
    /// Whether this is a caller-visible domain outcome rather than an
    /// infrastructure failure.
    pub fn is_domain(&self) -> bool {
        !matches!(self, ResetError::Store(_) | ResetError::Hashing(_))
    }
}
