/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file when present) into a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8000)
/// - `PUBLIC_URL`: base URL used in confirmation links
/// - `CORS_ORIGINS`: comma-separated origins, or `*` (default)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `REDIS_URL`: Redis connection string (required)
/// - `CLOUDINARY_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET` (required)
/// - `SMTP_HOST` and friends: optional, mail is skipped without them
///
/// # Example
///
/// ```no_run
/// use photoshare_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use chrono::Duration;
use photoshare_shared::auth::jwt::TokenLifetimes;
use photoshare_shared::cloud::CloudinaryConfig;
use photoshare_shared::mail::EmailConfig;
use photoshare_shared::redis::RedisConfig;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub cloudinary: CloudinaryConfig,

    /// `None` disables outgoing mail
    pub email: Option<EmailConfig>,

    pub limits: LimitsConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Externally reachable base URL, without trailing slash
    pub public_url: String,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub lifetimes: TokenLifetimes,
}

/// Request limits and cache tuning
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Signups allowed per client IP within `signup_window_secs`
    pub signup_requests: u32,
    pub signup_window_secs: u64,

    /// Maximum request body size (uploads included)
    pub max_upload_bytes: usize,

    /// Lifetime of cached user rows
    pub user_cache_ttl_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            signup_requests: 5,
            signup_window_secs: 300,
            max_upload_bytes: 10 * 1024 * 1024,
            user_cache_ttl_secs: 900,
        }
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

fn parsed_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parsed_or::<u16>("API_PORT", 8000)?;

        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let lifetimes = TokenLifetimes {
            access: Duration::minutes(parsed_or("JWT_ACCESS_TTL_MINUTES", 15)?),
            refresh: Duration::days(parsed_or("JWT_REFRESH_TTL_DAYS", 7)?),
            email: Duration::days(parsed_or("JWT_EMAIL_TTL_DAYS", 7)?),
        };

        let redis = RedisConfig::from_env()?;

        let cloudinary = CloudinaryConfig::new(
            required("CLOUDINARY_NAME")?,
            required("CLOUDINARY_API_KEY")?,
            required("CLOUDINARY_API_SECRET")?,
        );

        let email = match env::var("SMTP_HOST") {
            Ok(smtp_host) if !smtp_host.trim().is_empty() => {
                let username = required("SMTP_USERNAME")?;
                let from_address = env::var("MAIL_FROM").unwrap_or_else(|_| username.clone());
                Some(EmailConfig {
                    smtp_host,
                    smtp_port: parsed_or("SMTP_PORT", 465)?,
                    password: required("SMTP_PASSWORD")?,
                    username,
                    from_address,
                })
            }
            _ => None,
        };

        let defaults = LimitsConfig::default();
        let limits = LimitsConfig {
            signup_requests: parsed_or("SIGNUP_RATE_LIMIT", defaults.signup_requests)?,
            signup_window_secs: parsed_or("SIGNUP_RATE_WINDOW_SECS", defaults.signup_window_secs)?,
            max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            user_cache_ttl_secs: parsed_or("USER_CACHE_TTL_SECS", defaults.user_cache_ttl_secs)?,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                public_url,
                cors_origins,
                production: parsed_or("PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                lifetimes,
            },
            redis,
            cloudinary,
            email,
            limits,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Link a user follows to confirm their email
    pub fn confirmation_url(&self, token: &str) -> String {
        format!("{}/api/auth/confirmed_email/{}", self.api.public_url, token)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}
