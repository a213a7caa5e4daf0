use crate::cli::{utils::output_success, OutputFormat};
use crate::database::DatabaseManager;

pub async fn handle(database_url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = super::connect(database_url.as_deref()).await?;
    DatabaseManager::run_migrations(&pool).await?;
    pool.close().await;
    output_success(output_format, "Migrations applied", None)
}
