use std::fmt;
use std::str::FromStr;

use auth::Claims;
use auth::TokenError;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::identity::errors::CredentialError;
use crate::identity::errors::EmailError;
use crate::identity::errors::IdentityIdError;
use crate::identity::errors::RoleNameError;

/// Claim carrying the identity id in session tokens.
pub const IDENTITY_ID_CLAIM: &str = "user_id";

/// Claim carrying the role name in session tokens.
pub const ROLE_CLAIM: &str = "role";

/// Identity aggregate entity.
///
/// A registered account. The password is only ever held as a PHC hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: IdentityId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub last_authenticated_at: Option<DateTime<Utc>>,
}

/// Identity unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    /// Generate a new random identity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identity ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, IdentityIdError> {
        Uuid::parse_str(s)
            .map(IdentityId)
            .map_err(|e| IdentityIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validated with an RFC 5322 parser. The original casing is preserved;
/// comparisons for uniqueness go through `normalized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    // RFC 5321 forward-path limit; also the width of the stored column
    const MAX_LENGTH: usize = 254;

    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `TooLong` - Email exceeds 254 characters
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        let length = email.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            });
        }

        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive key used for uniqueness and lookup.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role name value type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleName(String);

impl RoleName {
    const MAX_LENGTH: usize = 50;

    /// Create a role name, trimming surrounding whitespace.
    ///
    /// # Errors
    /// * `Empty` - Name is blank
    /// * `TooLong` - Name exceeds 50 characters
    pub fn new(name: impl Into<String>) -> Result<Self, RoleNameError> {
        let name = name.into().trim().to_string();
        let length = name.chars().count();
        if length == 0 {
            Err(RoleNameError::Empty)
        } else if length > Self::MAX_LENGTH {
            Err(RoleNameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named permission class shared by many identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
}

/// Command to register a new identity with domain types
#[derive(Debug)]
pub struct RegisterCommand {
    pub email: EmailAddress,
    pub password: String,
    pub role: RoleName,
}

impl RegisterCommand {
    /// Construct a register command from validated fields.
    ///
    /// # Arguments
    /// * `email` - Validated email address
    /// * `password` - Plain text password (will be hashed by service)
    /// * `role` - Requested role name
    pub fn new(email: EmailAddress, password: String, role: RoleName) -> Self {
        Self {
            email,
            password,
            role,
        }
    }

    /// Build a command from raw input.
    ///
    /// # Errors
    /// * `InvalidEmail` - Email is not well formed
    /// * `UnknownRole` - Role name is blank or too long to be a known role
    pub fn parse(email: &str, password: &str, role: &str) -> Result<Self, CredentialError> {
        let email = EmailAddress::new(email.to_string())?;
        let role = RoleName::new(role).map_err(|_| CredentialError::UnknownRole(role.to_string()))?;

        Ok(Self::new(email, password.to_string(), role))
    }
}

/// Outcome of a successful registration or authentication.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub role: Role,
    /// Signed session token
    pub token: String,
}

/// Semantic claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub identity_id: IdentityId,
    pub role: RoleName,
}

impl SessionClaims {
    pub fn new(identity_id: IdentityId, role: RoleName) -> Self {
        Self { identity_id, role }
    }

    /// Claim set to sign into a session token.
    pub fn to_claims(&self) -> Claims {
        Claims::new()
            .with_subject(self.identity_id)
            .with_extra(IDENTITY_ID_CLAIM, self.identity_id.to_string())
            .with_extra(ROLE_CLAIM, self.role.as_str())
    }

    /// Extract session semantics from verified claims.
    ///
    /// # Errors
    /// * `Malformed` - Identity or role claim is missing or invalid
    pub fn from_claims(claims: &Claims) -> Result<Self, TokenError> {
        let identity_id = claims
            .get_str(IDENTITY_ID_CLAIM)
            .or(claims.sub.as_deref())
            .ok_or_else(|| TokenError::Malformed(format!("missing claim: {}", IDENTITY_ID_CLAIM)))?;
        let identity_id = IdentityId::from_string(identity_id)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let role = claims
            .get_str(ROLE_CLAIM)
            .ok_or_else(|| TokenError::Malformed(format!("missing claim: {}", ROLE_CLAIM)))?;
        let role = RoleName::new(role).map_err(|e| TokenError::Malformed(e.to_string()))?;

        Ok(Self { identity_id, role })
    }
}
