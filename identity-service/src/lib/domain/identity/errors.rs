use auth::PasswordError;
use auth::TokenError;
use thiserror::Error;

use crate::domain::errors::StoreError;

/// Error for IdentityId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),

    #[error("Email too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Error for RoleName validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleNameError {
    #[error("Role name is empty")]
    Empty,

    #[error("Role name too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Top-level error for registration and authentication
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Identity already exists: {0}")]
    DuplicateIdentity(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Infrastructure errors
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing failure: {0}")]
    Hashing(#[from] PasswordError),

    #[error("Token issuance failure: {0}")]
    TokenIssuance(TokenError),
}

impl CredentialError {
    /// Whether this is a caller-visible domain outcome rather than an
    /// infrastructure failure.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            CredentialError::Store(_)
                | CredentialError::Hashing(_)
                | CredentialError::TokenIssuance(_)
        )
    }
}
