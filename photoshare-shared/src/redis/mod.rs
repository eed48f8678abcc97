/// Redis integration
///
/// Redis holds short-lived state only:
///
/// ```text
/// blocklist:{jti}        revoked access tokens   (TTL = remaining token life)
/// user:{id}              cached user rows        (TTL 15 min)
/// ratelimit:signup:{ip}  signup token buckets    (owned by the API crate)
/// ```

pub mod client;
pub mod token_blocklist;
pub mod user_cache;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use token_blocklist::TokenBlocklist;
pub use user_cache::{UserCache, UserCacheConfig, UserCacheError};
