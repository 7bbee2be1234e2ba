use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use chrono::Duration;
use chrono::Utc;

use crate::domain::identity::models::EmailAddress;
use crate::domain::reset::models::ResetSecret;
use crate::domain::reset::models::ResetToken;
use crate::domain::reset::models::ResetTokenId;
use crate::domain::reset::models::SecretHash;
use crate::identity::ports::IdentityRepository;
use crate::reset::errors::ResetError;
use crate::reset::ports::ResetServicePort;
use crate::reset::ports::ResetTokenRepository;

/// Domain service implementation for the password-reset protocol.
pub struct ResetService<IR, TR>
where
    IR: IdentityRepository,
    TR: ResetTokenRepository,
{
    identities: Arc<IR>,
    tokens: Arc<TR>,
    password_hasher: PasswordHasher,
    token_ttl: Duration,
}

impl<IR, TR> ResetService<IR, TR>
where
    IR: IdentityRepository,
    TR: ResetTokenRepository,
{
    /// Create a new reset service with injected dependencies.
    ///
    /// # Arguments
    /// * `identities` - Identity persistence
    /// * `tokens` - Reset token persistence
    /// * `password_hasher` - Configured password hasher
    /// * `token_ttl` - Validity window of a reset token
    pub fn new(
        identities: Arc<IR>,
        tokens: Arc<TR>,
        password_hasher: PasswordHasher,
        token_ttl: Duration,
    ) -> Self {
        Self {
            identities,
            tokens,
            password_hasher,
            token_ttl,
        }
    }
}

#[async_trait]
impl<IR, TR> ResetServicePort for ResetService<IR, TR>
where
    IR: IdentityRepository,
    TR: ResetTokenRepository,
{
    async fn start_reset(&self, email: &str) -> Result<ResetSecret, ResetError> {
        let email = EmailAddress::new(email.to_string())?;

        let identity = self
            .identities
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ResetError::UnknownIdentity(email.to_string()))?;

        let secret = ResetSecret::generate();
        let token = ResetToken {
            id: ResetTokenId::new(),
            identity_id: identity.id,
            secret_hash: secret.hash(),
            expires_at: Utc::now() + self.token_ttl,
            used: false,
        };
        let token_id = token.id;

        self.tokens.save(token).await?;

        tracing::info!(
            identity_id = %identity.id,
            token_id = %token_id,
            "Password reset started"
        );

        Ok(secret)
    }

    async fn confirm_reset(&self, raw_secret: &str, new_password: &str) -> Result<(), ResetError> {
        let hash = SecretHash::of(raw_secret);

        let token = self
            .tokens
            .find_valid_by_hash(&hash, Utc::now())
            .await?
            .ok_or_else(|| {
                tracing::warn!("Password reset rejected: no valid token");
                ResetError::InvalidOrExpiredToken
            })?;

        let password_hash = self.password_hasher.hash(new_password)?;

        // Validity is re-checked atomically with the write; the lookup above
        // only avoids hashing for obviously bad secrets.
        let redeemed = self
            .tokens
            .redeem(&token.id, &token.identity_id, &password_hash, Utc::now())
            .await?;

        if !redeemed {
            tracing::warn!(token_id = %token.id, "Password reset rejected: token consumed concurrently");
            return Err(ResetError::InvalidOrExpiredToken);
        }

        tracing::info!(
            identity_id = %token.identity_id,
            token_id = %token.id,
            "Password reset completed"
        );

        Ok(())
    }

    async fn purge_stale(&self) -> Result<u64, ResetError> {
        let removed = self.tokens.purge_stale(Utc::now()).await?;
        if removed > 0 {
            tracing::debug!(count = removed, "Stale reset tokens purged");
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use auth::HashingCost;
    use chrono::DateTime;
    use mockall::mock;

    use super::*;
    use crate::domain::errors::StoreError;
    use crate::domain::identity::models::Identity;
    use crate::domain::identity::models::IdentityId;
    use crate::domain::identity::models::Role;
    use crate::domain::identity::models::RoleId;
    use crate::domain::identity::models::RoleName;

    mock! {
        pub TestIdentityRepository {}

        #[async_trait]
        impl IdentityRepository for TestIdentityRepository {
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>, StoreError>;
            async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError>;
            async fn insert_if_absent(&self, identity: Identity) -> Result<bool, StoreError>;
            async fn save(&self, identity: Identity) -> Result<(), StoreError>;
            async fn record_authentication(&self, id: &IdentityId, at: DateTime<Utc>) -> Result<(), StoreError>;
            async fn find_role_by_name(&self, name: &RoleName) -> Result<Option<Role>, StoreError>;
            async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, StoreError>;
            async fn ensure_role(&self, name: &RoleName) -> Result<Role, StoreError>;
        }
    }

    mock! {
        pub TestResetTokenRepository {}

        #[async_trait]
        impl ResetTokenRepository for TestResetTokenRepository {
            async fn save(&self, token: ResetToken) -> Result<(), StoreError>;
            async fn find_valid_by_hash(&self, hash: &SecretHash, now: DateTime<Utc>) -> Result<Option<ResetToken>, StoreError>;
            async fn mark_used_if_unused(&self, id: &ResetTokenId, now: DateTime<Utc>) -> Result<bool, StoreError>;
            async fn redeem(&self, id: &ResetTokenId, identity_id: &IdentityId, password_hash: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;
            async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
        }
    }

    fn service(
        identities: MockTestIdentityRepository,
        tokens: MockTestResetTokenRepository,
    ) -> ResetService<MockTestIdentityRepository, MockTestResetTokenRepository> {
        let hasher = PasswordHasher::with_cost(HashingCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();

        ResetService::new(
            Arc::new(identities),
            Arc::new(tokens),
            hasher,
            Duration::minutes(30),
        )
    }

    fn identity() -> Identity {
        Identity {
            id: IdentityId::new(),
            email: EmailAddress::new("a@b.com".to_string()).unwrap(),
            password_hash: "$argon2id$old_hash".to_string(),
            role_id: RoleId::new(),
            created_at: Utc::now(),
            last_authenticated_at: None,
        }
    }

    fn pending_token(secret: &str) -> ResetToken {
        ResetToken {
            id: ResetTokenId::new(),
            identity_id: IdentityId::new(),
            secret_hash: SecretHash::of(secret),
            expires_at: Utc::now() + Duration::minutes(30),
            used: false,
        }
    }

    #[tokio::test]
    async fn test_start_reset_persists_only_hash() {
        let mut identities = MockTestIdentityRepository::new();
        let mut tokens = MockTestResetTokenRepository::new();
        let identity = identity();
        let identity_id = identity.id;

        identities
            .expect_find_by_email()
            .withf(|email| email.as_str() == "a@b.com")
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));

        let saved = Arc::new(std::sync::Mutex::new(None));
        let saved_clone = Arc::clone(&saved);
        tokens
            .expect_save()
            .withf(move |token| token.identity_id == identity_id && !token.used)
            .times(1)
            .returning(move |token| {
                *saved_clone.lock().unwrap() = Some(token);
                Ok(())
            });

        let service = service(identities, tokens);
        let before = Utc::now();

        let secret = service.start_reset("a@b.com").await.unwrap();

        let token = saved.lock().unwrap().clone().unwrap();
        assert_eq!(token.secret_hash, secret.hash());
        assert_ne!(token.secret_hash.as_str(), secret.expose());
        assert!(token.expires_at >= before + Duration::minutes(30));
        assert!(token.expires_at <= Utc::now() + Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_start_reset_unknown_identity() {
        let mut identities = MockTestIdentityRepository::new();
        let mut tokens = MockTestResetTokenRepository::new();

        identities
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        tokens.expect_save().times(0);

        let service = service(identities, tokens);

        let result = service.start_reset("nobody@b.com").await;
        assert!(matches!(result, Err(ResetError::UnknownIdentity(_))));
    }

    #[tokio::test]
    async fn test_start_reset_invalid_email() {
        let mut identities = MockTestIdentityRepository::new();
        identities.expect_find_by_email().times(0);

        let service = service(identities, MockTestResetTokenRepository::new());

        let result = service.start_reset("not-an-email").await;
        assert!(matches!(result, Err(ResetError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_confirm_reset_success() {
        let mut tokens = MockTestResetTokenRepository::new();
        let token = pending_token("the-secret");
        let token_id = token.id;
        let identity_id = token.identity_id;

        tokens
            .expect_find_valid_by_hash()
            .withf(|hash, _| *hash == SecretHash::of("the-secret"))
            .times(1)
            .returning(move |_, _| Ok(Some(token.clone())));
        tokens
            .expect_redeem()
            .withf(move |id, identity, password_hash, _| {
                *id == token_id
                    && *identity == identity_id
                    && password_hash.starts_with("$argon2id$")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let service = service(MockTestIdentityRepository::new(), tokens);

        assert!(service.confirm_reset("the-secret", "newpw").await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_reset_unknown_secret() {
        let mut tokens = MockTestResetTokenRepository::new();

        tokens
            .expect_find_valid_by_hash()
            .times(1)
            .returning(|_, _| Ok(None));
        tokens.expect_redeem().times(0);

        let service = service(MockTestIdentityRepository::new(), tokens);

        let result = service.confirm_reset("wrong-secret", "newpw").await;
        assert!(matches!(result, Err(ResetError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_confirm_reset_lost_race() {
        let mut tokens = MockTestResetTokenRepository::new();
        let token = pending_token("the-secret");

        tokens
            .expect_find_valid_by_hash()
            .returning(move |_, _| Ok(Some(token.clone())));
        tokens.expect_redeem().times(1).returning(|_, _, _, _| Ok(false));

        let service = service(MockTestIdentityRepository::new(), tokens);

        let result = service.confirm_reset("the-secret", "newpw").await;
        assert!(matches!(result, Err(ResetError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_confirm_reset_store_failure_is_not_domain_error() {
        let mut tokens = MockTestResetTokenRepository::new();
        let token = pending_token("the-secret");

        tokens
            .expect_find_valid_by_hash()
            .returning(move |_, _| Ok(Some(token.clone())));
        tokens
            .expect_redeem()
            .returning(|_, _, _, _| Err(StoreError::Database("deadlock detected".to_string())));

        let service = service(MockTestIdentityRepository::new(), tokens);

        let error = service.confirm_reset("the-secret", "newpw").await.unwrap_err();
        assert!(matches!(error, ResetError::Store(_)));
        assert!(!error.is_domain());
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let mut tokens = MockTestResetTokenRepository::new();
        tokens.expect_purge_stale().times(1).returning(|_| Ok(3));

        let service = service(MockTestIdentityRepository::new(), tokens);

        assert_eq!(service.purge_stale().await.unwrap(), 3);
    }
}
