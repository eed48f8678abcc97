/// Authentication context for Axum handlers
///
/// The API's JWT layer validates the bearer token, checks the blocklist,
/// loads the user and inserts an [`AuthContext`] into the request
/// extensions. Handlers pick it up with `Extension<AuthContext>`.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use photoshare_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user.username)
/// }
/// ```

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::jwt::Claims;
use crate::models::user::{Role, User};

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The current user, as loaded from cache or database
    pub user: User,

    /// `jti` of the access token used for this request
    pub token_id: Uuid,

    /// `exp` of the access token (Unix timestamp)
    pub token_expires_at: i64,
}

impl AuthContext {
    /// Builds the context from validated access-token claims
    pub fn new(user: User, claims: &Claims) -> Self {
        Self {
            user,
            token_id: claims.jti,
            token_expires_at: claims.exp,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Remaining lifetime of the access token, at least one second
    ///
    /// Used as the blocklist TTL on logout.
    pub fn token_ttl(&self) -> Duration {
        let remaining = self.token_expires_at - Utc::now().timestamp();
        Duration::seconds(remaining.max(1))
    }
}

/// Error type for credential extraction
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Authorization header is not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed or token was revoked
    #[error("{0}")]
    InvalidToken(String),

    /// Account exists but is banned
    #[error("User is banned")]
    Inactive,
}

/// Extracts the bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}
