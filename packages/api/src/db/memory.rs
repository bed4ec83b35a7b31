use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{UserStore, IDENTITY_TAKEN};
use crate::error::StoreError;
use crate::models::{NewUser, User};

/// In-memory UserStore for testing and local runs without a database.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member directly, skipping validation.
    pub fn seed(&self, user: NewUser) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            identity_url: user.identity_url,
            login: user.login,
            email: user.email,
            fullname: user.fullname,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_identity_url(&self, identity_url: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.identity_url == identity_url)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let errors = user.validate();
        if !errors.is_empty() {
            return Err(StoreError::Invalid(errors));
        }

        let taken = self
            .users
            .lock()
            .unwrap()
            .values()
            .any(|u| u.identity_url == user.identity_url);
        if taken {
            return Err(StoreError::Invalid(vec![IDENTITY_TAKEN.to_string()].into()));
        }

        Ok(self.seed(user))
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let errors = user.validate();
        if !errors.is_empty() {
            return Err(StoreError::Invalid(errors));
        }

        let mut users = self.users.lock().unwrap();
        let Some(stored) = users.get_mut(&user.id) else {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };
        stored.login = user.login.clone();
        stored.email = user.email.clone();
        stored.fullname = user.fullname.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}
