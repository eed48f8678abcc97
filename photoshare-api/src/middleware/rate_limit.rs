/// Signup rate limiting
///
/// Token bucket per client IP, stored in Redis so every API instance shares
/// the same budget. Default: 5 signups per 300 seconds.
///
/// # Algorithm
///
/// - The bucket holds `capacity` tokens and refills at `capacity / window`
///   tokens per second
/// - Each request consumes one token
/// - An empty bucket answers 429 with `Retry-After`
///
/// The refill and the consume run in one Lua script, so concurrent requests
/// cannot overspend the bucket.
///
/// # Storage
///
/// Key `ratelimit:signup:{ip}`, a hash of `tokens` and `last_refill` (ms),
/// expiring after twice the window.
///
/// # Client IP
///
/// First entry of `X-Forwarded-For`, then `X-Real-IP`, then the socket peer
/// address.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::net::SocketAddr;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_per_ms))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', now)
redis.call('EXPIRE', key, ttl)

local retry_after = 0
if allowed == 0 then
    retry_after = math.ceil((1 - tokens) / refill_per_ms / 1000)
end

return {allowed, math.floor(tokens), retry_after}
"#;

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum burst, and requests allowed per window
    pub capacity: u32,

    pub window_secs: u64,
}

impl RateLimit {
    pub fn new(capacity: u32, window_secs: u64) -> Self {
        Self {
            capacity: capacity.max(1),
            window_secs: window_secs.max(1),
        }
    }

    /// Tokens added per millisecond
    pub fn refill_per_ms(&self) -> f64 {
        self.capacity as f64 / (self.window_secs as f64 * 1000.0)
    }

    /// Key expiry: twice the window
    pub fn key_ttl_secs(&self) -> u64 {
        self.window_secs * 2
    }
}

/// Outcome of one bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,

    /// Seconds until one token is available again; 0 when allowed
    pub retry_after: u64,
}

impl RateLimitResult {
    fn from_script(raw: &[i64]) -> Option<Self> {
        match raw {
            [allowed, remaining, retry_after] => Some(Self {
                allowed: *allowed == 1,
                remaining: (*remaining).max(0) as u32,
                retry_after: if *allowed == 1 {
                    0
                } else {
                    (*retry_after).max(1) as u64
                },
            }),
            _ => None,
        }
    }
}

/// Redis key for a signup bucket
pub fn signup_key(client_ip: &str) -> String {
    format!("ratelimit:signup:{}", client_ip)
}

/// Best-effort client IP for rate limiting
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Runs the token bucket script for `key`
pub async fn check_rate_limit(
    state: &AppState,
    key: &str,
    limit: RateLimit,
) -> Result<RateLimitResult, ApiError> {
    let script = redis::Script::new(TOKEN_BUCKET_SCRIPT);
    let mut conn = state.redis.get_connection();
    let now_ms = Utc::now().timestamp_millis();

    let mut invocation = script.key(key);
    invocation
        .arg(limit.capacity)
        .arg(limit.refill_per_ms())
        .arg(now_ms)
        .arg(limit.key_ttl_secs());

    let raw: Vec<i64> = tokio::time::timeout(
        state.redis.command_timeout(),
        invocation.invoke_async(&mut conn),
    )
    .await
    .map_err(|_| ApiError::ServiceUnavailable("Rate limit check timed out".to_string()))?
    .map_err(|e| {
        tracing::error!(error = %e, "Rate limit script failed");
        ApiError::ServiceUnavailable("Rate limit check failed".to_string())
    })?;

    RateLimitResult::from_script(&raw)
        .ok_or_else(|| ApiError::InternalError("Unexpected rate limit script result".to_string()))
}

/// Rate limiting middleware for the signup route
///
/// If Redis is unreachable the request goes through and a warning is
/// logged; signup itself still needs PostgreSQL, not Redis.
pub async fn signup_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    let limits = &state.config.limits;
    let limit = RateLimit::new(limits.signup_requests, limits.signup_window_secs);

    let result = match check_rate_limit(&state, &signup_key(&ip), limit).await {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::warn!(error = %e, client_ip = %ip, "Skipping signup rate limit");
            None
        }
    };

    if let Some(result) = result {
        if !result.allowed {
            tracing::info!(client_ip = %ip, retry_after = result.retry_after, "Signup rate limited");
            return Err(ApiError::RateLimitExceeded {
                retry_after: result.retry_after,
                message: format!(
                    "Too many signup attempts. Try again in {} seconds",
                    result.retry_after
                ),
            });
        }
    }

    let mut response = next.run(request).await;

    if let Some(result) = result {
        let headers = response.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.capacity));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    }

    Ok(response)
}
