/// Health check endpoint
///
/// ```text
/// GET /api/healthchecker
/// ```
///
/// ```json
/// {
///   "message": "Welcome to PhotoShare!",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "connected"
/// }
/// ```
///
/// A failing database answers 500. Redis only degrades the report, since
/// requests can still be served from PostgreSQL.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use photoshare_shared::db::pool;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub version: String,
    pub database: String,
    pub redis: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    pool::health_check(&state.db).await.map_err(|e| {
        ApiError::InternalError(format!("Error connecting to database: {}", e))
    })?;

    let redis_status = match state.redis.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Redis health check failed");
            "disconnected"
        }
    };

    Ok(Json(HealthResponse {
        message: "Welcome to PhotoShare!".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: "connected".to_string(),
        redis: redis_status.to_string(),
    }))
}
