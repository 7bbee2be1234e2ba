use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::errors::StoreError;
use crate::domain::identity::models::IdentityId;
use crate::domain::reset::models::ResetSecret;
use crate::domain::reset::models::ResetToken;
use crate::domain::reset::models::ResetTokenId;
use crate::domain::reset::models::SecretHash;
use crate::reset::errors::ResetError;

/// Port for the self-service password-reset protocol.
#[async_trait]
pub trait ResetServicePort: Send + Sync + 'static {
    /// Start a reset for the identity owning `email`.
    ///
    /// # Returns
    /// The raw one-time secret, to be delivered out of band
    ///
    /// # Errors
    /// * `InvalidEmail` - Email is not well formed
    /// * `UnknownIdentity` - No identity owns the email
    /// * `Store` - Persistence failed
    async fn start_reset(&self, email: &str) -> Result<ResetSecret, ResetError>;

    /// Redeem a secret and replace the password.
    ///
    /// # Errors
    /// * `InvalidOrExpiredToken` - Secret unknown, expired or already used
    /// * `Store`, `Hashing` - Infrastructure failure
    async fn confirm_reset(&self, raw_secret: &str, new_password: &str) -> Result<(), ResetError>;

    /// Delete used and expired reset records.
    ///
    /// # Returns
    /// Number of records removed
    async fn purge_stale(&self) -> Result<u64, ResetError>;
}

/// Persistence operations for reset-token records.
#[async_trait]
pub trait ResetTokenRepository: Send + Sync + 'static {
    /// Persist a new reset token.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn save(&self, token: ResetToken) -> Result<(), StoreError>;

    /// Retrieve the token with this hash if it is unused and unexpired at `now`.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_valid_by_hash(
        &self,
        hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError>;

    /// Set `used` iff the token is still unused and unexpired at `now`.
    ///
    /// # Returns
    /// `true` for the single caller that flipped the flag
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn mark_used_if_unused(
        &self,
        id: &ResetTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Consume the token and store the new password hash as one unit.
    ///
    /// Either both the `used` flag and the identity's password hash change,
    /// or neither does.
    ///
    /// # Returns
    /// `false` when the token was no longer valid; nothing is written
    ///
    /// # Errors
    /// * `MissingReference` - The identity no longer exists; nothing is written
    /// * `Database` - Database operation failed; nothing is written
    async fn redeem(
        &self,
        id: &ResetTokenId,
        identity_id: &IdentityId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete tokens that are used or expired at `now`.
    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
