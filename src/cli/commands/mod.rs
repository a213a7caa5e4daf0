pub mod migrate;
pub mod organization;
pub mod ping;
pub mod token;

use sqlx::PgPool;

use crate::database::DatabaseManager;

/// Explicit URL wins; otherwise the shared pool built from DATABASE_URL
pub(crate) async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let pool = match database_url {
        Some(url) => DatabaseManager::connect(url).await?,
        None => DatabaseManager::pool().await?,
    };
    Ok(pool)
}
