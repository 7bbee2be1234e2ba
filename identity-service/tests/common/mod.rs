use std::sync::Arc;

use auth::HashingCost;
use auth::PasswordHasher;
use auth::TokenIssuer;
use chrono::Duration;
use identity_service::identity::models::Authenticated;
use identity_service::identity::models::RegisterCommand;
use identity_service::identity::ports::CredentialServicePort;
use identity_service::identity::service::CredentialService;
use identity_service::repositories::InMemoryStore;
use identity_service::reset::service::ResetService;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

/// Hasher with a cheap cost; production uses the configured cost
pub fn password_hasher() -> PasswordHasher {
    PasswordHasher::with_cost(HashingCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Failed to create password hasher")
}

/// Services wired over a shared in-process store
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub credentials: Arc<CredentialService<InMemoryStore>>,
    pub resets: Arc<ResetService<InMemoryStore, InMemoryStore>>,
    pub token_issuer: Arc<TokenIssuer>,
}

impl TestApp {
    /// Build the services with the roles "buyer", "organizer" and "admin"
    pub async fn spawn() -> Self {
        let store = Arc::new(
            InMemoryStore::with_roles(&["buyer", "organizer", "admin"])
                .await
                .expect("Failed to provision roles"),
        );

        let password_hasher = password_hasher();

        let token_issuer =
            Arc::new(TokenIssuer::new(JWT_SECRET).expect("Failed to create token issuer"));

        let credentials = Arc::new(
            CredentialService::new(
                Arc::clone(&store),
                password_hasher.clone(),
                Arc::clone(&token_issuer),
                Duration::hours(24),
            )
            .expect("Failed to create credential service"),
        );

        let resets = Arc::new(ResetService::new(
            Arc::clone(&store),
            Arc::clone(&store),
            password_hasher,
            Duration::minutes(30),
        ));

        Self {
            store,
            credentials,
            resets,
            token_issuer,
        }
    }

    /// Register an identity, panicking on failure
    pub async fn register(&self, email: &str, password: &str, role: &str) -> Authenticated {
        let command =
            RegisterCommand::parse(email, password, role).expect("Failed to build command");

        self.credentials
            .register(command)
            .await
            .expect("Failed to register identity")
    }
}
