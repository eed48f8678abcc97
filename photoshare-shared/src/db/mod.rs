/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded sqlx migrations from the workspace `migrations/` directory
///
/// Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
