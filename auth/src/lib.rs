//! Credential primitives library
//!
//! Provides the storage-agnostic building blocks of credential handling:
//! - Password hashing (Argon2id, PHC strings)
//! - Signed session tokens (HS256 JWT) with expiry
//!
//! Services define their own claim semantics and error taxonomy on top.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify("other_password", &hash));
//! ```
//!
//! ## Session Tokens
//! ```
//! use auth::{Claims, TokenIssuer};
//! use chrono::Duration;
//!
//! let issuer = TokenIssuer::new(b"secret_key_at_least_32_bytes_long!").unwrap();
//! let claims = Claims::new().with_subject("user123").with_extra("role", "buyer");
//! let token = issuer.generate(&claims, Duration::hours(24)).unwrap();
//! let decoded = issuer.parse(&token).unwrap();
//! assert_eq!(decoded.get_str("role"), Some("buyer"));
//! ```

pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use jwt::Claims;
pub use jwt::TokenError;
pub use jwt::TokenIssuer;
pub use password::HashingCost;
pub use password::PasswordError;
pub use password::PasswordHasher;
