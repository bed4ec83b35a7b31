//! Shared application state handed to every handler.

use std::sync::Arc;

use api::auth::LoginFlow;
use api::db::UserStore;
use api::openid::OpenIdProvider;
use api::Settings;

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<LoginFlow>,
    pub store: Arc<dyn UserStore>,
    /// Public origin, used for MicroID claims.
    pub site: String,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn UserStore>,
        provider: Arc<dyn OpenIdProvider>,
    ) -> Self {
        Self {
            flow: Arc::new(LoginFlow::new(store.clone(), provider, settings)),
            store,
            site: settings.server.realm(),
        }
    }
}
