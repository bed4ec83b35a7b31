//! Request-scoped session and authentication gate.
//!
//! An [`AuthContext`] is built for every request from the HTTP session and the
//! user store. It resolves the [`Principal`] at most once per request, writes the
//! `user_id` on login, remembers where an anonymous visitor was heading, and
//! queues the cookies the response has to carry.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::OnceCell;
use tower_sessions::cookie::Cookie;
use tower_sessions::Session;
use uuid::Uuid;

use super::principal::Principal;
use super::session::{
    Flash, SESSION_CSRF_KEY, SESSION_FLASH_KEY, SESSION_RETURN_TO_KEY, SESSION_USER_ID_KEY,
};
use crate::db::UserStore;
use crate::error::AuthError;

/// Path of the login form.
pub const LOGIN_PATH: &str = "/login";

/// Long-lived cookie remembering the last identity URL used on this browser.
pub const USER_URL_COOKIE: &str = "user_url";

/// Per-request authentication state.
pub struct AuthContext {
    session: Session,
    store: Arc<dyn UserStore>,
    current: OnceCell<Principal>,
    cookies: Vec<Cookie<'static>>,
}

impl AuthContext {
    pub fn new(session: Session, store: Arc<dyn UserStore>) -> Self {
        Self {
            session,
            store,
            current: OnceCell::new(),
            cookies: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The principal of this request, looked up from the session on first use.
    pub async fn current_user(&self) -> Result<&Principal, AuthError> {
        self.current
            .get_or_try_init(|| self.login_from_session())
            .await
    }

    pub async fn is_logged_in(&self) -> Result<bool, AuthError> {
        Ok(self.current_user().await?.is_authenticated())
    }

    async fn login_from_session(&self) -> Result<Principal, AuthError> {
        let user_id: Option<String> = self.session.get(SESSION_USER_ID_KEY).await?;

        let Some(user_id) = user_id else {
            return Ok(Principal::Anonymous);
        };

        let Ok(user_id) = Uuid::parse_str(&user_id) else {
            tracing::warn!("ignoring malformed user_id in session: {}", user_id);
            return Ok(Principal::Anonymous);
        };

        Ok(self.store.find_by_id(user_id).await?.into())
    }

    /// Log `principal` in, or log the current user out with
    /// [`Principal::Anonymous`].
    pub async fn set_current_user(&mut self, principal: Principal) -> Result<(), AuthError> {
        match &principal {
            Principal::Authenticated(user) => {
                self.session.cycle_id().await?;
                self.session
                    .insert(SESSION_USER_ID_KEY, user.id.to_string())
                    .await?;
                self.cookies
                    .push(user_url_cookie(&user.identity_url, OffsetDateTime::now_utc()));
            }
            Principal::Anonymous => {
                self.session.remove::<String>(SESSION_USER_ID_KEY).await?;
            }
        }

        self.current = OnceCell::new_with(Some(principal));
        Ok(())
    }

    /// For an anonymous request, remember `requested_uri` and return the login
    /// path to redirect to. Returns `None` when a user is logged in.
    pub async fn require_login(&self, requested_uri: &str) -> Result<Option<String>, AuthError> {
        if self.is_logged_in().await? {
            return Ok(None);
        }

        self.session
            .insert(SESSION_RETURN_TO_KEY, requested_uri.to_string())
            .await?;
        Ok(Some(LOGIN_PATH.to_string()))
    }

    /// The stored return location, or `default`. The stored one is cleared.
    pub async fn redirect_back_or_default(&self, default: &str) -> Result<String, AuthError> {
        let return_to: Option<String> = self.session.remove(SESSION_RETURN_TO_KEY).await?;
        Ok(return_to.unwrap_or_else(|| default.to_string()))
    }

    pub async fn flash_notice(&self, message: impl Into<String>) -> Result<(), AuthError> {
        let mut flash = self.peek_flash().await?;
        flash.notice = Some(message.into());
        self.session.insert(SESSION_FLASH_KEY, flash).await?;
        Ok(())
    }

    pub async fn flash_error(&self, message: impl Into<String>) -> Result<(), AuthError> {
        let mut flash = self.peek_flash().await?;
        flash.error = Some(message.into());
        self.session.insert(SESSION_FLASH_KEY, flash).await?;
        Ok(())
    }

    /// Messages for the page being rendered; they are gone afterwards.
    pub async fn take_flash(&self) -> Result<Flash, AuthError> {
        let flash: Option<Flash> = self.session.remove(SESSION_FLASH_KEY).await?;
        Ok(flash.unwrap_or_default())
    }

    async fn peek_flash(&self) -> Result<Flash, AuthError> {
        let flash: Option<Flash> = self.session.get(SESSION_FLASH_KEY).await?;
        Ok(flash.unwrap_or_default())
    }

    /// The anti-forgery token for forms of this session, created on demand.
    pub async fn authenticity_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.session.get::<String>(SESSION_CSRF_KEY).await? {
            return Ok(token);
        }

        let token = Uuid::new_v4().simple().to_string();
        self.session.insert(SESSION_CSRF_KEY, token.clone()).await?;
        Ok(token)
    }

    pub async fn verify_authenticity_token(&self, submitted: Option<&str>) -> Result<bool, AuthError> {
        let expected: Option<String> = self.session.get(SESSION_CSRF_KEY).await?;
        Ok(matches!((expected, submitted), (Some(expected), Some(submitted)) if expected == submitted))
    }

    /// Cookies queued by this request, to be written on the response.
    pub fn take_cookies(&mut self) -> Vec<Cookie<'static>> {
        std::mem::take(&mut self.cookies)
    }
}

/// Identity URL without its scheme and without one trailing slash.
pub fn url_to_string(url: &str) -> String {
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    url.strip_suffix('/').unwrap_or(url).to_string()
}

/// The `user_url` cookie, expiring two calendar years after `now`.
pub fn user_url_cookie(identity_url: &str, now: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((USER_URL_COOKIE, url_to_string(identity_url)))
        .path("/")
        .expires(two_years_after(now))
        .build()
}

fn two_years_after(now: OffsetDateTime) -> OffsetDateTime {
    let year = now.year() + 2;
    now.replace_year(year)
        // 29 February has no counterpart two years on.
        .or_else(|_| now.replace_day(28).and_then(|d| d.replace_year(year)))
        .unwrap_or(now + Duration::days(730))
}
