//! # User model for OpenID members
//!
//! Two representations of an Orb member:
//!
//! ## [`User`]
//!
//! A persisted row of the `users` table. It derives [`sqlx::FromRow`] and carries:
//!
//! - `id` — primary key (`UUID v4`), assigned by the store.
//! - `identity_url` — the verified OpenID identifier, unique across the table.
//! - `login`, `email`, `fullname` — profile fields copied from the provider's
//!   registration attributes (`nickname`, `email`, `fullname`).
//! - `created_at` / `updated_at` — audit timestamps.
//!
//! ## [`NewUser`]
//!
//! A member seen for the first time. It has no id until the store creates it.
//!
//! Both implement [`validate`](User::validate), which returns the full messages
//! shown to the member when their profile cannot be saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::ProfileUpdate;
use crate::error::ValidationErrors;

/// Full user record from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub identity_url: String,
    pub login: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Apply staged registration attributes. Untouched fields keep their value.
    pub fn apply(&mut self, update: ProfileUpdate) {
        update.assign(&mut self.login, &mut self.email, &mut self.fullname);
    }

    pub fn validate(&self) -> ValidationErrors {
        validate_fields(
            &self.identity_url,
            self.login.as_deref(),
            self.email.as_deref(),
        )
    }

    /// Name shown in greetings: login, then full name, then the identity URL.
    pub fn display_name(&self) -> &str {
        self.login
            .as_deref()
            .or(self.fullname.as_deref())
            .unwrap_or(&self.identity_url)
    }
}

/// A user that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub identity_url: String,
    pub login: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
}

impl NewUser {
    pub fn new(identity_url: impl Into<String>) -> Self {
        Self {
            identity_url: identity_url.into(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: ProfileUpdate) {
        update.assign(&mut self.login, &mut self.email, &mut self.fullname);
    }

    pub fn validate(&self) -> ValidationErrors {
        validate_fields(
            &self.identity_url,
            self.login.as_deref(),
            self.email.as_deref(),
        )
    }
}

fn validate_fields(identity_url: &str, login: Option<&str>, email: Option<&str>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if identity_url.trim().is_empty() {
        errors.add("Identity url can't be blank");
    }

    if login.map_or(true, |l| l.trim().is_empty()) {
        errors.add("Login can't be blank");
    }

    match email.map(str::trim) {
        None | Some("") => errors.add("Email can't be blank"),
        Some(email) => {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                errors.add("Email is invalid");
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            identity_url: "http://alice.example.org/".to_string(),
            login: Some("alice".to_string()),
            email: Some("alice@example.org".to_string()),
            fullname: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_user() {
        assert!(stored().validate().is_empty());
    }

    #[test]
    fn test_new_user_without_profile() {
        let user = NewUser::new("http://bob.example.org/");
        assert_eq!(
            user.validate().messages(),
            ["Login can't be blank", "Email can't be blank"]
        );
    }

    #[test]
    fn test_invalid_email() {
        let mut user = stored();
        user.email = Some("not-an-address".to_string());
        assert_eq!(user.validate().messages(), ["Email is invalid"]);

        user.email = Some("@example.org".to_string());
        assert_eq!(user.validate().messages(), ["Email is invalid"]);
    }

    #[test]
    fn test_blank_identity_url() {
        let mut user = NewUser::new("  ");
        user.login = Some("carol".to_string());
        user.email = Some("carol@example.org".to_string());
        assert_eq!(user.validate().messages(), ["Identity url can't be blank"]);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = stored();
        assert_eq!(user.display_name(), "alice");

        user.login = None;
        user.fullname = Some("Alice Liddell".to_string());
        assert_eq!(user.display_name(), "Alice Liddell");

        user.fullname = None;
        assert_eq!(user.display_name(), "http://alice.example.org/");
    }
}
