//! Database migration command.

use chartjob_core::config::AppConfig;
use chartjob_database::migration::run_migrations;

use crate::context::connect_database;

/// Apply pending migrations.
pub async fn execute(config: &AppConfig) -> anyhow::Result<()> {
    let db = connect_database(config).await?;
    run_migrations(db.pool()).await?;
    db.close().await;
    println!("Migrations applied");
    Ok(())
}
