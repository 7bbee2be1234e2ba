use thiserror::Error;

/// Error type for token operations.
///
/// `Malformed`, `SignatureInvalid` and `Expired` describe a token presented
/// by a caller. `Signing` and `WeakSecret` are server-side failures and must
/// not be reported as a bad token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token is malformed: {0}")]
    Malformed(String),

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token is expired")]
    Expired,

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Signing secret too short: minimum {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },
}

impl TokenError {
    /// Whether the error comes from server configuration or crypto
    /// primitives rather than from the presented token.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TokenError::Signing(_) | TokenError::WeakSecret { .. })
    }
}
