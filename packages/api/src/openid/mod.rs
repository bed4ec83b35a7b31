//! # OpenID relying-party seam
//!
//! The login flow talks to OpenID through the [`OpenIdProvider`] trait. A login
//! attempt has two legs:
//!
//! 1. [`begin`](OpenIdProvider::begin) — discover the member's OpenID server and
//!    either send the browser there ([`BeginOutcome::Redirect`]) or answer at
//!    once ([`BeginOutcome::Complete`], e.g. when discovery fails).
//! 2. [`complete`](OpenIdProvider::complete) — turn the parameters the server
//!    sent back into a single [`Verification`].
//!
//! A [`Verification`] is handed to the login flow by value, so each attempt is
//! resolved exactly once. [`HttpProvider`] is the production implementation.

mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::auth::Registration;

pub use http::HttpProvider;

/// Outcome of a verification, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No OpenID server could be found for the identifier.
    Missing,
    /// The member declined at their OpenID server.
    Canceled,
    /// The server did not vouch for the assertion.
    Failed,
    Successful,
    /// Anything else, with the provider's message.
    Other(String),
}

/// The single result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub status: Status,
    /// The verified identity URL; only meaningful when `status` is `Successful`.
    pub identity_url: Option<String>,
    pub registration: Registration,
}

impl Verification {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            identity_url: None,
            registration: Registration::new(),
        }
    }

    pub fn successful(identity_url: impl Into<String>, registration: Registration) -> Self {
        Self {
            status: Status::Successful,
            identity_url: Some(identity_url.into()),
            registration,
        }
    }
}

/// What the relying party asks the OpenID server for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Normalized identifier the member typed.
    pub identifier: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub return_to: String,
    pub realm: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Send the browser to the OpenID server.
    Redirect(String),
    /// The attempt ended before reaching the server.
    Complete(Verification),
}

#[async_trait]
pub trait OpenIdProvider: Send + Sync {
    async fn begin(&self, request: AuthRequest) -> BeginOutcome;

    /// `params` are the query parameters the OpenID server returned with.
    async fn complete(&self, return_to: &str, params: &HashMap<String, String>) -> Verification;
}

/// Normalize a user-supplied identifier into a URL.
///
/// Adds `http://` when no scheme is given, drops any fragment, and lets the URL
/// parser supply the `/` path of a bare host. Returns `None` when the input is
/// blank or not a usable http(s) URL.
pub fn normalize_identifier(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let lower = input.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("http://{}", input)
    };

    let mut url = Url::parse(&candidate).ok()?;
    if url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(
            normalize_identifier("alice.example.org").as_deref(),
            Some("http://alice.example.org/")
        );
        assert_eq!(
            normalize_identifier("  https://example.org/alice#me ").as_deref(),
            Some("https://example.org/alice")
        );
        assert_eq!(
            normalize_identifier("HTTP://Example.ORG").as_deref(),
            Some("http://example.org/")
        );
        assert_eq!(normalize_identifier(""), None);
        assert_eq!(normalize_identifier("   "), None);
        assert_eq!(normalize_identifier("http://"), None);
    }
}
