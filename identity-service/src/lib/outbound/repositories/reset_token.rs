use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgExecutor;
use sqlx::PgPool;
use sqlx::Row;

use super::identity::database_error;
use crate::domain::errors::StoreError;
use crate::domain::identity::models::IdentityId;
use crate::domain::reset::models::ResetToken;
use crate::domain::reset::models::ResetTokenId;
use crate::domain::reset::models::SecretHash;
use crate::domain::reset::ports::ResetTokenRepository;

/// Reset-token persistence.
///
/// Shares the database with `PostgresIdentityRepository`: `redeem` updates
/// the `identities` table in the same transaction that consumes the token.
pub struct PostgresResetTokenRepository {
    pool: PgPool,
}

impl PostgresResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_from_row(row: &PgRow) -> Result<ResetToken, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());

    Ok(ResetToken {
        id: ResetTokenId(row.try_get("id").map_err(corrupt)?),
        identity_id: IdentityId(row.try_get("identity_id").map_err(corrupt)?),
        secret_hash: SecretHash::from_stored(row.try_get("secret_hash").map_err(corrupt)?),
        expires_at: row.try_get("expires_at").map_err(corrupt)?,
        used: row.try_get("used").map_err(corrupt)?,
    })
}

/// Compare-and-swap on the `used` flag.
async fn mark_used<'e, E>(
    executor: E,
    id: &ResetTokenId,
    now: DateTime<Utc>,
) -> Result<bool, StoreError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE reset_tokens
        SET used = TRUE
        WHERE id = $1 AND used = FALSE AND expires_at > $2
        "#,
    )
    .bind(id.0)
    .bind(now)
    .execute(executor)
    .await
    .map_err(database_error)?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl ResetTokenRepository for PostgresResetTokenRepository {
    async fn save(&self, token: ResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reset_tokens (id, identity_id, secret_hash, expires_at, used)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id.0)
        .bind(token.identity_id.0)
        .bind(token.secret_hash.as_str())
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_foreign_key_violation() {
                    return StoreError::MissingReference(format!(
                        "identity {}",
                        token.identity_id
                    ));
                }
            }
            database_error(e)
        })?;

        Ok(())
    }

    async fn find_valid_by_hash(
        &self,
        hash: &SecretHash,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetToken>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, identity_id, secret_hash, expires_at, used
            FROM reset_tokens
            WHERE secret_hash = $1 AND used = FALSE AND expires_at > $2
            "#,
        )
        .bind(hash.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn mark_used_if_unused(
        &self,
        id: &ResetTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        mark_used(&self.pool, id, now).await
    }

    async fn redeem(
        &self,
        id: &ResetTokenId,
        identity_id: &IdentityId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        if !mark_used(&mut *tx, id, now).await? {
            tx.rollback().await.map_err(database_error)?;
            return Ok(false);
        }

        let updated = sqlx::query("UPDATE identities SET password_hash = $2 WHERE id = $1")
            .bind(identity_id.0)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(database_error)?;
            return Err(StoreError::MissingReference(format!(
                "identity {}",
                identity_id
            )));
        }

        tx.commit().await.map_err(database_error)?;

        Ok(true)
    }

    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM reset_tokens WHERE used = TRUE OR expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
