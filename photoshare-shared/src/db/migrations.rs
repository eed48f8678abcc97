/// Schema migrations embedded from the workspace `migrations/` directory

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::{PgPool, Postgres};
use tracing::{error, info};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Brings the schema up to date. Already applied versions are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let known = MIGRATOR.iter().count();
    info!(migrations = known, "Applying database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Database migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Versions recorded as successfully applied, oldest first
///
/// Empty when the bookkeeping table has not been created yet.
pub async fn applied_versions(pool: &PgPool) -> Result<Vec<i64>, sqlx::Error> {
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations')::text")
            .fetch_one(pool)
            .await?;

    if tracked.is_none() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
        .fetch_all(pool)
        .await
}

/// Creates the target database when missing. Used by tests and local setup.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Creating missing database");
        Postgres::create_database(database_url).await?;
    }
    Ok(())
}
