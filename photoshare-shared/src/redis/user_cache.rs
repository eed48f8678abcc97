/// Short-lived cache of user rows
///
/// Every authenticated request needs the current user. The JWT layer reads
/// `user:{id}` from Redis first and only falls back to PostgreSQL on a miss.
/// Entries expire after a fixed TTL and are dropped whenever the user row
/// changes.
///
/// Each user also has a generation counter at `user:{id}:gen`. Invalidation
/// bumps it, and a fill only lands if the counter still holds the value read
/// before the database lookup. A request that loaded the row before a ban
/// therefore cannot write the pre-ban copy back.

use uuid::Uuid;

use super::client::{RedisClient, RedisClientError};
use crate::models::user::User;

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum UserCacheError {
    #[error(transparent)]
    Redis(#[from] RedisClientError),

    /// Cached value could not be (de)serialized
    #[error("Invalid cached user: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Redis key for a cached user
pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// Redis key for a user's invalidation counter
pub fn generation_key(user_id: Uuid) -> String {
    format!("user:{}:gen", user_id)
}

/// KEYS[1] = user key, KEYS[2] = generation key
/// ARGV[1] = JSON, ARGV[2] = expected generation, ARGV[3] = TTL
const FILL_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[2]) or '0')
if current ~= tonumber(ARGV[2]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

/// KEYS[1] = user key, KEYS[2] = generation key, ARGV[1] = TTL
const INVALIDATE_SCRIPT: &str = r#"
redis.call('DEL', KEYS[1])
local generation = redis.call('INCR', KEYS[2])
redis.call('EXPIRE', KEYS[2], ARGV[1])
return generation
"#;

/// Configuration for the user cache
#[derive(Debug, Clone)]
pub struct UserCacheConfig {
    /// Entry lifetime in seconds. Default: 900
    pub ttl_seconds: u64,
}

impl Default for UserCacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 900 }
    }
}

#[derive(Clone)]
pub struct UserCache {
    client: RedisClient,
    config: UserCacheConfig,
}

impl UserCache {
    pub fn new(client: RedisClient) -> Self {
        Self::with_config(client, UserCacheConfig::default())
    }

    pub fn with_config(client: RedisClient, config: UserCacheConfig) -> Self {
        Self { client, config }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<User>, UserCacheError> {
        let raw: Option<String> = self
            .client
            .query(redis::cmd("GET").arg(user_key(user_id)))
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Current invalidation counter; read it before loading the row
    pub async fn generation(&self, user_id: Uuid) -> Result<u64, UserCacheError> {
        let raw: Option<u64> = self
            .client
            .query(redis::cmd("GET").arg(generation_key(user_id)))
            .await?;
        Ok(raw.unwrap_or(0))
    }

    /// Caches `user` unless it was invalidated after `generation` was read
    ///
    /// Returns whether the entry was written.
    pub async fn put_if_current(&self, user: &User, generation: u64) -> Result<bool, UserCacheError> {
        let json = serde_json::to_string(user)?;

        let script = redis::Script::new(FILL_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(user_key(user.id))
            .key(generation_key(user.id))
            .arg(json)
            .arg(generation)
            .arg(self.config.ttl_seconds);

        let written: i64 = self.client.invoke(&invocation).await?;
        Ok(written == 1)
    }

    /// Drops the entry and bumps the generation so in-flight fills are discarded
    pub async fn invalidate(&self, user_id: Uuid) -> Result<(), UserCacheError> {
        let script = redis::Script::new(INVALIDATE_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(user_key(user_id))
            .key(generation_key(user_id))
            .arg(self.config.ttl_seconds.max(1));

        let _: i64 = self.client.invoke(&invocation).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::redis::client::RedisConfig;
    use chrono::Utc;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "cached".to_string(),
            email: "cached@example.com".to_string(),
            password_hash: "hash".to_string(),
            avatar_url: None,
            refresh_token: None,
            role: Role::User,
            confirmed: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_key() {
        assert_eq!(user_key(Uuid::nil()), "user:00000000-0000-0000-0000-000000000000");
        assert_eq!(
            generation_key(Uuid::nil()),
            "user:00000000-0000-0000-0000-000000000000:gen"
        );
        assert_eq!(UserCacheConfig::default().ttl_seconds, 900);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_fill_get_invalidate() {
        let client = RedisClient::new(RedisConfig::local()).await.unwrap();
        let cache = UserCache::new(client);
        let user = sample_user();

        assert!(cache.get(user.id).await.unwrap().is_none());

        let generation = cache.generation(user.id).await.unwrap();
        assert!(cache.put_if_current(&user, generation).await.unwrap());
        let cached = cache.get(user.id).await.unwrap().unwrap();
        assert_eq!(cached.username, "cached");
        assert_eq!(cached.role, Role::User);

        cache.invalidate(user.id).await.unwrap();
        assert!(cache.get(user.id).await.unwrap().is_none());
        assert_eq!(cache.generation(user.id).await.unwrap(), generation + 1);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_fill_after_invalidation_is_dropped() {
        let client = RedisClient::new(RedisConfig::local()).await.unwrap();
        let cache = UserCache::new(client);
        let active = sample_user();

        // Reader sees the generation and the active row
        let generation = cache.generation(active.id).await.unwrap();

        // Ban lands in between
        cache.invalidate(active.id).await.unwrap();

        // Stale fill is refused
        assert!(!cache.put_if_current(&active, generation).await.unwrap());
        assert!(cache.get(active.id).await.unwrap().is_none());

        // A fresh read fills normally
        let banned = User {
            is_active: false,
            ..active
        };
        let generation = cache.generation(banned.id).await.unwrap();
        assert!(cache.put_if_current(&banned, generation).await.unwrap());
        assert!(!cache.get(banned.id).await.unwrap().unwrap().is_active);

        cache.invalidate(banned.id).await.unwrap();
    }
}
