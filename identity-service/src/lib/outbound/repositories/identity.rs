use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::RoleId;
use crate::domain::identity::models::RoleName;
use crate::domain::identity::ports::IdentityRepository;

pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn database_error(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "Database operation failed");
    StoreError::Database(e.to_string())
}

fn identity_from_row(row: &PgRow) -> Result<Identity, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());

    Ok(Identity {
        id: IdentityId(row.try_get("id").map_err(corrupt)?),
        email: EmailAddress::new(row.try_get("email").map_err(corrupt)?)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        password_hash: row.try_get("password_hash").map_err(corrupt)?,
        role_id: RoleId(row.try_get("role_id").map_err(corrupt)?),
        created_at: row.try_get("created_at").map_err(corrupt)?,
        last_authenticated_at: row.try_get("last_authenticated_at").map_err(corrupt)?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Role {
        id: RoleId(id),
        name: RoleName::new(name).map_err(|e| StoreError::Corrupt(e.to_string()))?,
    })
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role_id, created_at, last_authenticated_at
            FROM identities
            WHERE email_normalized = $1
            "#,
        )
        .bind(email.normalized())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, role_id, created_at, last_authenticated_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn insert_if_absent(&self, identity: Identity) -> Result<bool, StoreError> {
        // The unique constraint decides; a concurrent insert of the same
        // email makes this statement affect zero rows.
        let result = sqlx::query(
            r#"
            INSERT INTO identities
                (id, email, email_normalized, password_hash, role_id, created_at, last_authenticated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email_normalized) DO NOTHING
            "#,
        )
        .bind(identity.id.0)
        .bind(identity.email.as_str())
        .bind(identity.email.normalized())
        .bind(identity.password_hash.as_str())
        .bind(identity.role_id.0)
        .bind(identity.created_at)
        .bind(identity.last_authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_foreign_key_violation() {
                    return StoreError::MissingReference(format!("role {}", identity.role_id));
                }
            }
            database_error(e)
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, identity: Identity) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET password_hash = $2, role_id = $3, last_authenticated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(identity.id.0)
        .bind(identity.password_hash.as_str())
        .bind(identity.role_id.0)
        .bind(identity.last_authenticated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!(
                "identity {}",
                identity.id
            )));
        }

        Ok(())
    }

    async fn record_authentication(
        &self,
        id: &IdentityId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE identities SET last_authenticated_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("identity {}", id)));
        }

        Ok(())
    }

    async fn find_role_by_name(&self, name: &RoleName) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;

        row.as_ref().map(role_from_row).transpose()
    }

    async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;

        row.as_ref().map(role_from_row).transpose()
    }

    async fn ensure_role(&self, name: &RoleName) -> Result<Role, StoreError> {
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(RoleId::new().0)
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        self.find_role_by_name(name)
            .await?
            .ok_or_else(|| StoreError::MissingReference(format!("role {}", name)))
    }
}
