use thiserror::Error;

/// Error for store operations.
///
/// Every variant is an infrastructure failure. Conditional outcomes such as
/// "email already taken" or "token already used" are reported through the
/// return value of the store operation, never through this type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Referenced record missing: {0}")]
    MissingReference(String),
}
