use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::RoleId;
use crate::domain::identity::models::RoleName;
use crate::domain::identity::ports::IdentityRepository;
use crate::domain::reset::models::ResetToken;
use crate::domain::reset::models::ResetTokenId;
use crate::domain::reset::models::SecretHash;
use crate::domain::reset::ports::ResetTokenRepository;

/// In-process store implementing both identity and reset-token ports.
///
/// All state sits behind one lock, so every conditional operation
/// (create-if-absent, mark-used-if-unused, redeem) is a single critical
/// section. Suitable for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    identities: HashMap<IdentityId, Identity>,
    // normalized email -> identity
    emails: HashMap<String, IdentityId>,
    roles: HashMap<RoleId, Role>,
    tokens: HashMap<ResetTokenId, ResetToken>,
}

impl State {
    fn mark_used_if_unused(&mut self, id: &ResetTokenId, now: DateTime<Utc>) -> bool {
        match self.tokens.get_mut(id) {
            Some(token) if token.is_valid_at(now) => {
                token.used = true;
                true
            }
            _ => false,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given roles provisioned.
    pub async fn with_roles(names: &[&str]) -> Result<Self, StoreError> {
        let store = Self::new();
        for name in names {
            let name = RoleName::new(*name).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            store.ensure_role(&name).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>, StoreError> {
        let state = self.state.lock().await;

        Ok(state
            .emails
            .get(&email.normalized())
            .and_then(|id| state.identities.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError> {
        Ok(self.state.lock().await.identities.get(id).cloned())
    }

    async fn insert_if_absent(&self, identity: Identity) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        let key = identity.email.normalized();
        if state.emails.contains_key(&key) {
            return Ok(false);
        }
        if !state.roles.contains_key(&identity.role_id) {
            return Err(StoreError::MissingReference(format!(
                "role {}",
                identity.role_id
            )));
        }

        state.emails.insert(key, identity.id);
        state.identities.insert(identity.id, identity);

        Ok(true)
    }

    async fn save(&self, identity: Identity) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let existing = state
            .identities
            .get_mut(&identity.id)
            .ok_or_else(|| StoreError::MissingReference(format!("identity {}", identity.id)))?;
        if existing.email.normalized() != identity.email.normalized() {
            return Err(StoreError::Corrupt(format!(
                "email of identity {} cannot change through save",
                identity.id
            )));
        }

        *existing = identity;

        Ok(())
    }

    async fn record_authentication(
        &self,
        id: &IdentityId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let identity = state
            .identities
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingReference(format!("identity {}", id)))?;
        identity.last_authenticated_at = Some(at);

        Ok(())
    }

    async fn find_role_by_name(&self, name: &RoleName) -> Result<Option<Role>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .find(|role| role.name == *name)
            .cloned())
    }

    async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.state.lock().await.roles.get(id).cloned())
    }

    async fn ensure_role(&self, name: &RoleName) -> Result<Role, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(role) = state.roles.values().find(|role| role.name == *name) {
            return Ok(role.clone());
        }

        let role = Role {
            id: RoleId::new(),
            name: name.clone(),
        };
        state.roles.insert(role.id, role.clone());

        Ok(role)
    }
}

#[async_trait]
impl ResetTokenRepository for InMemoryStore {
    async fn save(&self, token: ResetToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        if !state.identities.contains_key(&token.identity_id) {
            return Err(StoreError::MissingReference(format!(
                "identity {}",
                token.identity_id
            )));
        }
        state.tokens.insert(token.id, token);

        Ok(())
    }

    async fn find_valid_by_hash(
        &self,
        hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .tokens
            .values()
            .find(|token| token.secret_hash == *hash && token.is_valid_at(now))
            .cloned())
    }

    async fn mark_used_if_unused(
        &self,
        id: &ResetTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.mark_used_if_unused(id, now))
    }

    async fn redeem(
        &self,
        id: &ResetTokenId,
        identity_id: &IdentityId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        // Check the identity first so a failure leaves the token untouched
        if !state.identities.contains_key(identity_id) {
            return Err(StoreError::MissingReference(format!(
                "identity {}",
                identity_id
            )));
        }
        if !state.mark_used_if_unused(id, now) {
            return Ok(false);
        }
        if let Some(identity) = state.identities.get_mut(identity_id) {
            identity.password_hash = password_hash.to_string();
        }

        Ok(true)
    }

    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;

        let before = state.tokens.len();
        state.tokens.retain(|_, token| token.is_valid_at(now));

        Ok((before - state.tokens.len()) as u64)
    }
}
