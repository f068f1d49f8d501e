use crate::infrastructure::db::pool::DbPool;
use crate::modules::auth::model::User;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, username, password_hash, usage_count, bytes_processed, created_at, updated_at";

pub struct AuthRepository;

impl AuthRepository {
    pub async fn create_user(
        pool: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(user)
    }
}

/// Cumulative per-user usage counters, fed by the job executor as a
/// fire-and-forget side effect. Failures are logged by the caller and
/// never surface on a job.
#[async_trait]
pub trait UserAccounting: Send + Sync {
    async fn increment_usage(&self, owner_id: Uuid) -> Result<()>;
    async fn increment_bytes_processed(&self, owner_id: Uuid, bytes: i64) -> Result<()>;
}

pub struct PgUserAccounting {
    pool: DbPool,
}

impl PgUserAccounting {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserAccounting for PgUserAccounting {
    async fn increment_usage(&self, owner_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET usage_count = usage_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_bytes_processed(&self, owner_id: Uuid, bytes: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET bytes_processed = bytes_processed + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(owner_id)
        .bind(bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
