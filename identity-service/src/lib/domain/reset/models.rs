use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::DateTime;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use uuid::Uuid;

use crate::domain::identity::models::IdentityId;

/// Reset token unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResetTokenId(pub Uuid);

impl ResetTokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResetTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResetTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One-time secret handed to the account owner out of band.
///
/// Never persisted; only its `SecretHash` is stored. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ResetSecret(String);

impl ResetSecret {
    const ENTROPY_BYTES: usize = 32;

    /// Generate a fresh secret with 256 bits of OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Expose the raw secret for delivery.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> SecretHash {
        SecretHash::of(&self.0)
    }
}

impl fmt::Debug for ResetSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetSecret(<redacted>)")
    }
}

/// SHA-256 digest of a reset secret, base64 encoded.
///
/// A fast digest suffices because the secret itself carries the entropy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretHash(String);

impl SecretHash {
    pub fn of(raw_secret: &str) -> Self {
        Self(STANDARD.encode(Sha256::digest(raw_secret.as_bytes())))
    }

    /// Wrap a digest loaded from storage.
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Persisted record backing a password-reset attempt.
///
/// `used` only ever moves from `false` to `true`; expiry is derived from
/// `expires_at` and never written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub id: ResetTokenId,
    pub identity_id: IdentityId,
    pub secret_hash: SecretHash,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl ResetToken {
    /// Whether the token may still authorize a password change at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}
