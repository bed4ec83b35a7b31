//! # Database module — user persistence
//!
//! Members are persisted through the [`UserStore`] trait so the auth gate and the
//! login flow never see SQL. Two implementations ship here:
//!
//! - [`PgUserStore`] — the `users` table in PostgreSQL via SQLx. The unique index
//!   on `identity_url` backs the one-member-per-identity rule; a conflicting
//!   write comes back as a validation error rather than a database error.
//! - [`MemoryUserStore`] — a mutex-guarded map for tests and local runs.
//!
//! [`connect`] opens the pool from [`DatabaseSettings`](crate::settings::DatabaseSettings)
//! and [`migrate`] applies `packages/api/migrations`.

mod memory;
mod pool;
mod users;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewUser, User};

pub use memory::MemoryUserStore;
pub use pool::{connect, migrate};
pub use users::PgUserStore;

/// Message reported when an identity URL is already claimed.
pub const IDENTITY_TAKEN: &str = "Identity url has already been taken";

/// Persistence for members, keyed by id and by identity URL.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_identity_url(&self, identity_url: &str) -> Result<Option<User>, StoreError>;

    /// Validate and insert a new member.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Validate and write back the profile fields of an existing member.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}
