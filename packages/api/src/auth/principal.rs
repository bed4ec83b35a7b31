//! The resolved identity behind a request.

use crate::models::User;

/// Who the current request acts for. Anonymity is an explicit value, so a
/// resolved-but-anonymous request is never confused with an unresolved one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Authenticated(User),
    Anonymous,
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Authenticated(user) => Some(user),
            Principal::Anonymous => None,
        }
    }
}

impl From<Option<User>> for Principal {
    fn from(user: Option<User>) -> Self {
        user.map_or(Principal::Anonymous, Principal::Authenticated)
    }
}
