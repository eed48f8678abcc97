/// PostgreSQL connection pool
///
/// ```no_run
/// use photoshare_shared::db::pool::{create_pool, PoolSettings};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let pool = create_pool(&PoolSettings::for_url("postgresql://localhost/photoshare")).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Pool sizing and connection recycling
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl PoolSettings {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_connections = self.min_connections.min(max_connections);
        self
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .test_before_acquire(true)
    }
}

/// Connects and runs one health check before handing the pool out
pub async fn create_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        acquire_timeout_ms = settings.acquire_timeout.as_millis() as u64,
        "Connecting to PostgreSQL"
    );

    let pool = settings.options().connect(&settings.url).await?;
    health_check(&pool).await?;

    info!(connections = pool.size(), "PostgreSQL pool ready");
    Ok(pool)
}

/// Round-trips a trivial query
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    debug!(result = one, "Database health check");

    if one != 1 {
        return Err(sqlx::Error::Protocol(format!(
            "health check returned {}",
            one
        )));
    }
    Ok(())
}

/// Open and idle connection counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub open: u32,
    pub idle: u32,
}

impl PoolUsage {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            open: pool.size(),
            idle: pool.num_idle() as u32,
        }
    }

    pub fn busy(&self) -> u32 {
        self.open.saturating_sub(self.idle)
    }
}

pub async fn close_pool(pool: PgPool) {
    let usage = PoolUsage::of(&pool);
    info!(open = usage.open, busy = usage.busy(), "Closing PostgreSQL pool");
    pool.close().await;
}
