/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(50) NOT NULL,
///     email VARCHAR(150) NOT NULL,            -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     avatar_url VARCHAR(512),
///     refresh_token TEXT,
///     role user_role NOT NULL DEFAULT 'user',
///     confirmed BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use photoshare_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         username: "alice".to_string(),
///         email: "alice@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         avatar_url: None,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "ALICE@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Account role
///
/// Maps to the PostgreSQL enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    /// Gets role as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    /// Admins and moderators
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "user" => Ok(Role::User),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User account
///
/// `password_hash` and `refresh_token` never leave the server; responses go
/// through [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,

    /// The only refresh token currently accepted for this user
    pub refresh_token: Option<String>,

    pub role: Role,

    /// Set once the email confirmation link has been followed
    pub confirmed: bool,

    /// False once the user has been banned
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar_url.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub avatar_url: Option<String>,
}

/// Profile changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UpdateProfile {
    /// Builds an update where blank strings mean "keep the current value"
    pub fn from_form(username: Option<String>, email: Option<String>) -> Self {
        fn keep_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            username: keep_blank(username),
            email: keep_blank(email),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

/// Builds the Gravatar URL for an email address
pub fn gravatar_url(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{}?d=identicon", hex::encode(digest))
}

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar_url, refresh_token, \
                            role, confirmed, is_active, created_at, updated_at";

/// Advisory lock key serializing first-user detection during signup
const SIGNUP_LOCK_KEY: i64 = 0x7068_6f74_6f73_6872;

impl User {
    /// Creates a new user
    ///
    /// The very first account becomes [`Role::Admin`]; every later one is a
    /// plain [`Role::User`]. The count and the insert run in one transaction
    /// under an advisory lock.
    ///
    /// # Errors
    ///
    /// Returns a unique violation on `users_email_key` if the email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SIGNUP_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;

        let role = if existing == 0 { Role::Admin } else { Role::User };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, avatar_url, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.avatar_url)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by username
    ///
    /// Usernames are not unique; the oldest account wins.
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    /// Stores (or clears, with `None`) the refresh token
    pub async fn update_refresh_token(
        pool: &PgPool,
        id: Uuid,
        token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks the email as confirmed
    pub async fn confirm_email(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the avatar URL
    pub async fn update_avatar(
        pool: &PgPool,
        id: Uuid,
        avatar_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET avatar_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(avatar_url)
        .fetch_optional(pool)
        .await
    }

    /// Updates username and/or email
    ///
    /// Only `Some` fields are written. With nothing to change the current row
    /// is returned unchanged.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        if data.is_empty() {
            return Self::find_by_id(pool, id).await;
        }

        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.username.is_some() {
            bind_count += 1;
            query.push_str(&format!(", username = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(username) = data.username {
            q = q.bind(username);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }

        q.fetch_optional(pool).await
    }

    /// Activates or bans a user
    ///
    /// Banning also drops the stored refresh token so the account cannot mint
    /// new access tokens.
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_active = $2,
                refresh_token = CASE WHEN $2 THEN refresh_token ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(pool)
        .await
    }

    /// Changes the role of a user
    pub async fn set_role(pool: &PgPool, id: Uuid, role: Role) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Counts the images uploaded by a user
    pub async fn count_images(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images WHERE user_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Deletes a user and, through cascades, their images and comments
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_strings() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!("Moderator".parse::<Role>().unwrap(), Role::Moderator);
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_role_is_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_update_profile_ignores_blank_fields() {
        let update = UpdateProfile::from_form(Some("  ".to_string()), Some(String::new()));
        assert!(update.is_empty());

        let update = UpdateProfile::from_form(Some(" bob ".to_string()), None);
        assert_eq!(update.username.as_deref(), Some("bob"));
        assert!(update.email.is_none());
    }

    #[test]
    fn test_gravatar_url() {
        // md5("myemailaddress@example.com")
        assert_eq!(
            gravatar_url(" MyEmailAddress@example.com "),
            "https://www.gravatar.com/avatar/0bc83cb571cd1c50ba6f3e8a78ef1346?d=identicon"
        );
    }

    #[test]
    fn test_profile_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice1".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            avatar_url: None,
            refresh_token: Some("token".to_string()),
            role: Role::User,
            confirmed: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["username"], "alice1");
    }
}
