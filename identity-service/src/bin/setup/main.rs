use auth::PasswordHasher;
use auth::TokenIssuer;
use identity_service::config::Config;
use identity_service::identity::models::RoleName;
use identity_service::identity::ports::IdentityRepository;
use identity_service::outbound::repositories::PostgresIdentityRepository;
use identity_service::outbound::repositories::PostgresResetTokenRepository;
use identity_service::reset::ports::ResetTokenRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prepares a database for the credential services: applies migrations,
/// provisions the configured roles and drops stale reset tokens.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,identity_setup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-setup",
        version = env!("CARGO_PKG_VERSION"),
        "Setup starting"
    );

    let config = Config::load()?;

    tracing::info!(
        roles = ?config.roles,
        session_ttl_hours = config.jwt.expiration_hours,
        reset_ttl_minutes = config.reset.token_ttl_minutes,
        "Configuration loaded"
    );

    // Fail before touching the database if the credentials config is unusable
    TokenIssuer::new(config.jwt.secret.as_bytes())?;
    PasswordHasher::with_cost(config.hashing)?;

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = 5,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let identities = PostgresIdentityRepository::new(pg_pool.clone());
    for name in &config.roles {
        let role = identities.ensure_role(&RoleName::new(name.as_str())?).await?;
        tracing::info!(role_id = %role.id, role = %role.name, "Role provisioned");
    }

    let tokens = PostgresResetTokenRepository::new(pg_pool);
    let purged = tokens.purge_stale(chrono::Utc::now()).await?;
    tracing::info!(count = purged, "Stale reset tokens purged");

    Ok(())
}
