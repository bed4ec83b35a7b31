//! Error types shared by the store and the auth gate.
//!
//! Provider failures are not errors here: they arrive as
//! [`Status`](crate::openid::Status) values and end in a flash message.

use std::fmt;

use thiserror::Error;

/// Field-level validation messages, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Joins the messages the way a sentence lists things:
    /// `a`, `a and b`, `a, b, and c`.
    pub fn to_sentence(&self) -> String {
        match self.0.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{} and {}", first, second),
            [init @ .., last] => format!("{}, and {}", init.join(", "), last),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sentence())
    }
}

impl From<Vec<String>> for ValidationErrors {
    fn from(messages: Vec<String>) -> Self {
        Self(messages)
    }
}

/// Errors returned by a [`UserStore`](crate::db::UserStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by the request-scoped auth gate.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
