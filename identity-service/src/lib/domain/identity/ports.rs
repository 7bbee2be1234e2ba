use async_trait::async_trait;
use auth::TokenError;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::errors::StoreError;
use crate::domain::identity::models::Authenticated;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::RegisterCommand;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::RoleId;
use crate::domain::identity::models::RoleName;
use crate::domain::identity::models::SessionClaims;
use crate::identity::errors::CredentialError;

/// Port for registration and authentication.
#[async_trait]
pub trait CredentialServicePort: Send + Sync + 'static {
    /// Register a new identity and issue a session token for it.
    ///
    /// # Errors
    /// * `UnknownRole` - Requested role is not provisioned
    /// * `DuplicateIdentity` - Email is already registered
    /// * `Store`, `Hashing`, `TokenIssuance` - Infrastructure failure
    async fn register(&self, command: RegisterCommand) -> Result<Authenticated, CredentialError>;

    /// Verify credentials, record the login and issue a session token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Email unknown or password wrong (not distinguished)
    /// * `Store`, `TokenIssuance` - Infrastructure failure
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Authenticated, CredentialError>;

    /// Verify a session token and extract its semantic claims.
    ///
    /// # Errors
    /// * `Malformed`, `SignatureInvalid`, `Expired` - Token rejected
    fn authorize(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

/// Persistence operations for identities and the roles they reference.
#[async_trait]
pub trait IdentityRepository: Send + Sync + 'static {
    /// Retrieve identity by email (case-insensitive).
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>, StoreError>;

    /// Retrieve identity by identifier.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError>;

    /// Atomically insert the identity unless its email is already taken.
    ///
    /// # Returns
    /// `true` if inserted, `false` if another identity owns the email
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn insert_if_absent(&self, identity: Identity) -> Result<bool, StoreError>;

    /// Update an existing identity.
    ///
    /// # Errors
    /// * `MissingReference` - Identity does not exist
    /// * `Database` - Database operation failed
    async fn save(&self, identity: Identity) -> Result<(), StoreError>;

    /// Set the last successful login time, leaving every other field as stored.
    ///
    /// # Errors
    /// * `MissingReference` - Identity does not exist
    /// * `Database` - Database operation failed
    async fn record_authentication(
        &self,
        id: &IdentityId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Retrieve role by unique name.
    async fn find_role_by_name(&self, name: &RoleName) -> Result<Option<Role>, StoreError>;

    /// Retrieve role by identifier.
    async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, StoreError>;

    /// Provision a role, returning the existing one if already present.
    async fn ensure_role(&self, name: &RoleName) -> Result<Role, StoreError>;
}
