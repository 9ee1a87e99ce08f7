use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PendingReset, User};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, reset_password_token, reset_password_expire, created_at";

/// Persistence of user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user. Returns `None` when the email is already taken.
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>>;

    /// Set or clear the reset token fields of a user.
    async fn set_reset_token(&self, id: Uuid, reset: Option<&PendingReset>) -> anyhow::Result<()>;

    /// Find the user holding `token_hash` whose token expires after `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;

    /// Replace the password hash and clear the reset token, provided the user
    /// still holds `token_hash`. Returns `false` when it was already used or
    /// replaced.
    async fn update_password(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        // ON CONFLICT keeps concurrent registrations of one email to a single row.
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn set_reset_token(&self, id: Uuid, reset: Option<&PendingReset>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_password_token = $2,
                   reset_password_expire = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reset.map(|r| r.token_hash.as_str()))
        .bind(reset.map(|r| r.expires_at))
        .execute(&self.db)
        .await
        .context("update reset token")?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE reset_password_token = $1
               AND reset_password_expire > $2
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        Ok(user)
    }

    async fn update_password(
        &self,
        id: Uuid,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3,
                   reset_password_token = NULL,
                   reset_password_expire = NULL
             WHERE id = $1
               AND reset_password_token = $2
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("update password")?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
pub use memory::MemoryUserRepo;
