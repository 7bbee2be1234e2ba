use thiserror::Error;

/// Error type for password operations.
///
/// None of these are credential mismatches: a wrong password is reported as
/// `false` by `PasswordHasher::verify`, never as an error.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid hashing cost parameters: {0}")]
    InvalidCost(String),
}
