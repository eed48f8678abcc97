/// JWT token generation and validation
///
/// Tokens are signed with HS256 and carry the user ID as subject plus a
/// random token ID (`jti`). The `jti` is what gets written to the Redis
/// blocklist when a user logs out.
///
/// # Token Types
///
/// - **Access**: short-lived (15 minutes), sent as `Authorization: Bearer`
/// - **Refresh**: long-lived (7 days), exchanged at `/api/auth/refresh_token`
/// - **Email verification**: 7 days, embedded in the confirmation link
///
/// # Example
///
/// ```
/// use photoshare_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_access_token(&token, "your-secret-key")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written to and required in every token
pub const ISSUER: &str = "photoshare";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, format or claim validation failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    /// Token is valid but of the wrong kind for this use
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Access token (15 minutes)
    Access,

    /// Refresh token (7 days)
    Refresh,

    /// Email confirmation token (7 days)
    EmailVerification,
}

impl TokenType {
    /// Gets default expiration duration for token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(15),
            TokenType::Refresh => Duration::days(7),
            TokenType::EmailVerification => Duration::days(7),
        }
    }

    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::EmailVerification => "email_verification",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
///
/// - `sub`: user ID
/// - `jti`: unique token ID, used for revocation
/// - `iss`: always "photoshare"
/// - `iat` / `nbf` / `exp`: Unix timestamps
/// - `token_type`: access, refresh or email verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Token ID
    pub jti: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type (custom claim)
    pub token_type: TokenType,
}

impl Claims {
    /// Creates new claims with the default expiration for `token_type`
    pub fn new(user_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, token_type, token_type.default_expiration())
    }

    /// Creates claims with a custom expiration
    ///
    /// ```
    /// use photoshare_shared::auth::jwt::{Claims, TokenType};
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::hours(1));
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            jti: Uuid::new_v4(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Creates a signed HS256 token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and extracts its claims
///
/// Verifies the signature, `exp`, `nbf` and the issuer. Does not look at the
/// token type; use one of the typed wrappers for that.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected,
            actual: claims.token_type,
        });
    }

    Ok(claims)
}

/// Validates a token and checks it is an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates a token and checks it is a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Validates a token and checks it is an email verification token
pub fn validate_email_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::EmailVerification)
}

/// Token lifetimes used when issuing tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub email: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: TokenType::Access.default_expiration(),
            refresh: TokenType::Refresh.default_expiration(),
            email: TokenType::EmailVerification.default_expiration(),
        }
    }
}

/// A freshly issued access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues a new access and refresh token for a user
pub fn issue_token_pair(
    user_id: Uuid,
    secret: &str,
    lifetimes: &TokenLifetimes,
) -> Result<TokenPair, JwtError> {
    let access = Claims::with_expiration(user_id, TokenType::Access, lifetimes.access);
    let refresh = Claims::with_expiration(user_id, TokenType::Refresh, lifetimes.refresh);

    Ok(TokenPair {
        access_token: create_token(&access, secret)?,
        refresh_token: create_token(&refresh, secret)?,
    })
}

/// Issues an email verification token for a user
pub fn issue_email_token(
    user_id: Uuid,
    secret: &str,
    lifetimes: &TokenLifetimes,
) -> Result<String, JwtError> {
    let claims = Claims::with_expiration(user_id, TokenType::EmailVerification, lifetimes.email);
    create_token(&claims, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::minutes(15));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(7));
        assert_eq!(TokenType::EmailVerification.default_expiration(), Duration::days(7));
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_each_token_gets_its_own_jti() {
        let user_id = Uuid::new_v4();
        let a = Claims::new(user_id, TokenType::Access);
        let b = Claims::new(user_id, TokenType::Access);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_claims_with_custom_expiration() {
        let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::hours(1));

        let time_left = claims.time_until_expiration().unwrap();
        assert!(time_left.num_seconds() > 3500);
        assert!(time_left.num_seconds() <= 3600);
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access);
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.jti, claims.jti);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), SECRET).unwrap();
        assert!(validate_token(&token, "another-secret-key-of-some-length").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_garbage() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_typed_validation() {
        let access = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), SECRET).unwrap();
        let refresh = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), SECRET).unwrap();
        let email =
            create_token(&Claims::new(Uuid::new_v4(), TokenType::EmailVerification), SECRET).unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(validate_email_token(&email, SECRET).is_ok());

        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongTokenType {
                expected: TokenType::Access,
                actual: TokenType::Refresh
            })
        ));
        assert!(validate_refresh_token(&access, SECRET).is_err());
        assert!(validate_email_token(&access, SECRET).is_err());
        assert!(validate_access_token(&email, SECRET).is_err());
    }

    #[test]
    fn test_issue_token_pair() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, SECRET, &TokenLifetimes::default()).unwrap();

        let access = validate_access_token(&pair.access_token, SECRET).unwrap();
        let refresh = validate_refresh_token(&pair.refresh_token, SECRET).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(refresh.sub, user_id);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn test_issue_email_token() {
        let user_id = Uuid::new_v4();
        let token = issue_email_token(user_id, SECRET, &TokenLifetimes::default()).unwrap();
        assert_eq!(validate_email_token(&token, SECRET).unwrap().sub, user_id);
    }

    #[test]
    fn test_token_type_serialization() {
        assert_eq!(
            serde_json::to_string(&TokenType::EmailVerification).unwrap(),
            "\"email_verification\""
        );
        assert_eq!(TokenType::Refresh.to_string(), "refresh");
    }
}
