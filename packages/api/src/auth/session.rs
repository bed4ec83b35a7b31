//! Session keys and the values stored under them.

use serde::{Deserialize, Serialize};

/// Key for storing user ID in session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// URL to resume after a forced login.
pub const SESSION_RETURN_TO_KEY: &str = "return_to";

/// One-shot messages for the next rendered page.
pub const SESSION_FLASH_KEY: &str = "flash";

/// Per-session anti-forgery token.
pub const SESSION_CSRF_KEY: &str = "csrf_token";

/// Messages carried across one redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.notice.is_none() && self.error.is_none()
    }
}
