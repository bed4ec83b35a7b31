use std::sync::Arc;
use std::time::Duration;

use api::db::{PgUserStore, UserStore};
use api::openid::HttpProvider;
use api::Settings;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

use state::AppState;

mod extract;
mod routes;
mod state;
mod views;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new()?;
    tracing::info!(policy = ?settings.auth.policy, "Loaded settings");

    let pool = api::db::connect(&settings.database).await?;
    api::db::migrate(&pool).await?;

    let session_store = PostgresStore::new(pool.clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(settings.server.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(
            Duration::from_secs(60 * 60 * 24 * 7).try_into()?,
        )); // 7 days

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let provider = Arc::new(HttpProvider::new().map_err(anyhow::Error::msg)?);
    let state = AppState::new(&settings, store, provider);

    let router = routes::router(state).layer(session_layer);

    let listener = tokio::net::TcpListener::bind(&settings.server.address).await?;
    tracing::info!("Server listening on {}", settings.server.address);

    axum::serve(listener, router).await?;
    Ok(())
}
