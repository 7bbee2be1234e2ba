use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordError;
use auth::PasswordHasher;
use auth::TokenError;
use auth::TokenIssuer;
use chrono::Duration;
use chrono::Utc;

use crate::domain::errors::StoreError;
use crate::domain::identity::models::Authenticated;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::RegisterCommand;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::SessionClaims;
use crate::identity::errors::CredentialError;
use crate::identity::ports::CredentialServicePort;
use crate::identity::ports::IdentityRepository;

/// Domain service implementation for registration and authentication.
pub struct CredentialService<IR>
where
    IR: IdentityRepository,
{
    repository: Arc<IR>,
    password_hasher: PasswordHasher,
    token_issuer: Arc<TokenIssuer>,
    session_ttl: Duration,
    // Verified against when the email is unknown so both rejection paths
    // pay the same hashing cost.
    decoy_hash: String,
}

impl<IR> CredentialService<IR>
where
    IR: IdentityRepository,
{
    /// Create a new credential service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Identity and role persistence
    /// * `password_hasher` - Configured password hasher
    /// * `token_issuer` - Session token signer
    /// * `session_ttl` - Lifetime of issued session tokens
    ///
    /// # Errors
    /// * `HashingFailed` - Could not prepare the decoy hash
    pub fn new(
        repository: Arc<IR>,
        password_hasher: PasswordHasher,
        token_issuer: Arc<TokenIssuer>,
        session_ttl: Duration,
    ) -> Result<Self, PasswordError> {
        let decoy_hash = password_hasher.hash("decoy-password-never-matches")?;

        Ok(Self {
            repository,
            password_hasher,
            token_issuer,
            session_ttl,
            decoy_hash,
        })
    }

    fn issue_token(&self, identity: &Identity, role: &Role) -> Result<String, CredentialError> {
        let claims = SessionClaims::new(identity.id, role.name.clone()).to_claims();

        self.token_issuer
            .generate(&claims, self.session_ttl)
            .map_err(|e| {
                tracing::error!(identity_id = %identity.id, error = %e, "Session token issuance failed");
                CredentialError::TokenIssuance(e)
            })
    }

    async fn role_of(&self, identity: &Identity) -> Result<Role, CredentialError> {
        self.repository
            .find_role_by_id(&identity.role_id)
            .await?
            .ok_or_else(|| {
                StoreError::MissingReference(format!(
                    "role {} of identity {}",
                    identity.role_id, identity.id
                ))
                .into()
            })
    }
}

#[async_trait]
impl<IR> CredentialServicePort for CredentialService<IR>
where
    IR: IdentityRepository,
{
    async fn register(&self, command: RegisterCommand) -> Result<Authenticated, CredentialError> {
        let role = self
            .repository
            .find_role_by_name(&command.role)
            .await?
            .ok_or_else(|| CredentialError::UnknownRole(command.role.to_string()))?;

        let password_hash = self.password_hasher.hash(&command.password)?;

        let identity = Identity {
            id: IdentityId::new(),
            email: command.email,
            password_hash,
            role_id: role.id,
            created_at: Utc::now(),
            last_authenticated_at: None,
        };

        // Uniqueness is decided by the store in the same step as the insert
        if !self.repository.insert_if_absent(identity.clone()).await? {
            tracing::warn!(role = %role.name, "Registration rejected: email already registered");
            return Err(CredentialError::DuplicateIdentity(
                identity.email.as_str().to_string(),
            ));
        }

        let token = self.issue_token(&identity, &role)?;

        tracing::info!(identity_id = %identity.id, role = %role.name, "Identity registered");

        Ok(Authenticated {
            identity,
            role,
            token,
        })
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Authenticated, CredentialError> {
        let identity = match EmailAddress::new(email.to_string()) {
            Ok(email) => self.repository.find_by_email(&email).await?,
            Err(_) => None,
        };

        let mut identity = match identity {
            Some(identity) if self.password_hasher.verify(password, &identity.password_hash) => {
                identity
            }
            Some(identity) => {
                tracing::warn!(identity_id = %identity.id, "Authentication rejected");
                return Err(CredentialError::InvalidCredentials);
            }
            None => {
                let _ = self.password_hasher.verify(password, &self.decoy_hash);
                tracing::warn!("Authentication rejected");
                return Err(CredentialError::InvalidCredentials);
            }
        };

        let role = self.role_of(&identity).await?;

        let now = Utc::now();
        self.repository
            .record_authentication(&identity.id, now)
            .await?;
        identity.last_authenticated_at = Some(now);

        let token = self.issue_token(&identity, &role)?;

        tracing::info!(identity_id = %identity.id, role = %role.name, "Identity authenticated");

        Ok(Authenticated {
            identity,
            role,
            token,
        })
    }

    fn authorize(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let claims = self.token_issuer.parse(token).map_err(|e| {
            if e.is_fatal() {
                tracing::error!(error = %e, "Session token verification failed");
            } else {
                tracing::warn!(error = %e, "Session token rejected");
            }
            e
        })?;

        SessionClaims::from_claims(&claims)
    }
}
