//! Database connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::settings::DatabaseSettings;

/// Open a connection pool for the configured database.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.url)
        .await
}

/// Apply pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
