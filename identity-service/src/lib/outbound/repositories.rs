pub mod identity;
pub mod memory;
pub mod reset_token;

pub use identity::PostgresIdentityRepository;
pub use memory::InMemoryStore;
pub use reset_token::PostgresResetTokenRepository;
