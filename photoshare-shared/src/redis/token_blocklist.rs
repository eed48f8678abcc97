/// Revoked-token blocklist
///
/// Logging out writes the access token's `jti` to Redis with a TTL equal to
/// the token's remaining lifetime. Once the token would have expired anyway
/// the key disappears on its own.
///
/// # Protocol
///
/// - **Key**: `blocklist:{jti}`
/// - **Value**: `1`
/// - **TTL**: remaining token lifetime, at least one second
///
/// # Example
///
/// ```no_run
/// use photoshare_shared::redis::client::{RedisClient, RedisConfig};
/// use photoshare_shared::redis::token_blocklist::TokenBlocklist;
/// use uuid::Uuid;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = RedisClient::new(RedisConfig::from_env()?).await?;
/// let blocklist = TokenBlocklist::new(client);
///
/// let jti = Uuid::new_v4();
/// blocklist.revoke(jti, 900).await?;
/// assert!(blocklist.is_revoked(jti).await?);
/// # Ok(())
/// # }
/// ```

use uuid::Uuid;

use super::client::{RedisClient, RedisClientError};

/// Redis key for a revoked token ID
pub fn blocklist_key(jti: Uuid) -> String {
    format!("blocklist:{}", jti)
}

#[derive(Clone)]
pub struct TokenBlocklist {
    client: RedisClient,
}

impl TokenBlocklist {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Blocks a token ID for `ttl_seconds`
    pub async fn revoke(&self, jti: Uuid, ttl_seconds: u64) -> Result<(), RedisClientError> {
        let ttl = ttl_seconds.max(1);

        let _: () = self
            .client
            .query(redis::cmd("SET").arg(blocklist_key(jti)).arg(1).arg("EX").arg(ttl))
            .await?;

        tracing::debug!(%jti, ttl_seconds = ttl, "Token revoked");
        Ok(())
    }

    /// Whether a token ID has been revoked
    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool, RedisClientError> {
        self.client
            .query(redis::cmd("EXISTS").arg(blocklist_key(jti)))
            .await
    }
}
