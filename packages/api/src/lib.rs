//! # API crate — OpenID login core for Orb
//!
//! Everything the web server needs to log members in and out with OpenID, kept
//! free of HTTP routing so it can be exercised directly in tests.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | sReg attribute mapping, the request-scoped [`AuthContext`](auth::AuthContext) gate, and the [`LoginFlow`](auth::LoginFlow) actions |
//! | [`db`] | The [`UserStore`](db::UserStore) trait, its PostgreSQL and in-memory implementations, pool and migrations |
//! | [`error`] | Store and gate error types |
//! | [`helpers`] | MicroID and Gravatar helpers for profile pages |
//! | [`models`] | The [`User`] record and [`NewUser`](models::NewUser) |
//! | [`openid`] | The [`OpenIdProvider`](openid::OpenIdProvider) seam and its HTTP implementation |
//! | [`settings`] | Layered configuration |
//!
//! ## Request lifecycle
//!
//! The web crate builds an [`AuthContext`](auth::AuthContext) per request from the
//! session and the store, passes it to a [`LoginFlow`](auth::LoginFlow) action, and
//! turns the returned location into a redirect carrying any queued cookies.

pub mod auth;
pub mod db;
pub mod error;
pub mod helpers;
pub mod models;
pub mod openid;
pub mod settings;

pub use models::User;
pub use settings::Settings;
