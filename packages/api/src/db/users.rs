//! PostgreSQL-backed [`UserStore`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{UserStore, IDENTITY_TAKEN};
use crate::error::{StoreError, ValidationErrors};
use crate::models::{NewUser, User};

/// Members stored in the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Translate a unique-index violation into the member-facing message.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Invalid(vec![IDENTITY_TAKEN.to_string()].into());
        }
    }
    StoreError::Database(err)
}

fn check(errors: ValidationErrors) -> Result<(), StoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Invalid(errors))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_identity_url(&self, identity_url: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE identity_url = $1")
            .bind(identity_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        check(user.validate())?;

        sqlx::query_as(
            r#"
            INSERT INTO users (identity_url, login, email, fullname)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.identity_url)
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.fullname)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        check(user.validate())?;

        sqlx::query_as(
            r#"
            UPDATE users
            SET login = $2, email = $3, fullname = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.fullname)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }
}
