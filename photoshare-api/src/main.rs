//! # PhotoShare API Server
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... REDIS_URL=redis://... JWT_SECRET=... \
//!     cargo run -p photoshare-api
//! ```
//!
//! See `config.rs` for the full list of environment variables.

use photoshare_api::{app, config::Config};
use photoshare_shared::{
    cloud::{CloudinaryStorage, ImageStorage},
    db::{
        migrations::run_migrations,
        pool::{self, PoolSettings},
    },
    mail::Mailer,
    redis::RedisClient,
};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photoshare_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "PhotoShare API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let db = pool::create_pool(
        &PoolSettings::for_url(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await?;
    run_migrations(&db).await?;

    let redis = RedisClient::new(config.redis.clone()).await?;
    let storage: Arc<dyn ImageStorage> =
        Arc::new(CloudinaryStorage::new(config.cloudinary.clone())?);

    let mailer = Mailer::new(config.email.clone())?;
    if !mailer.is_configured() {
        tracing::warn!("SMTP not configured, confirmation emails will not be sent");
    }

    let address = config.bind_address();
    let state = app::AppState::new(db.clone(), redis, storage, mailer, config);
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool::close_pool(db).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
