//! Common test utilities for integration tests
//!
//! Tests run the real router against PostgreSQL (`DATABASE_URL`) and Redis
//! (`REDIS_URL`). Image storage is the in-memory implementation and mail is
//! disabled, so no external service is contacted.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use photoshare_api::app::{build_router, AppState};
use photoshare_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, LimitsConfig};
use photoshare_shared::auth::jwt::{self, TokenLifetimes};
use photoshare_shared::auth::password::hash_password;
use photoshare_shared::cloud::{CloudinaryConfig, ImageStorage, MemoryStorage};
use photoshare_shared::db::migrations::run_migrations;
use photoshare_shared::mail::Mailer;
use photoshare_shared::models::user::{CreateUser, Role, User};
use photoshare_shared::redis::{RedisClient, RedisConfig, UserCache};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";
const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
const BOUNDARY: &str = "photoshare-test-boundary";

/// A confirmed account with a valid access token
pub struct TestUser {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub redis: RedisClient,
    pub storage: Arc<MemoryStorage>,
    pub app: axum::Router,
    pub config: Config,
    pub user: TestUser,
    created: std::sync::Mutex<Vec<Uuid>>,
}

impl TestContext {
    /// Connects, migrates and creates one confirmed regular user
    ///
    /// The signup rate limit is raised so tests do not trip over it.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_limits(LimitsConfig {
            signup_requests: 1000,
            ..LimitsConfig::default()
        })
        .await
    }

    pub async fn with_limits(limits: LimitsConfig) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = test_config(limits)?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let redis = RedisClient::new(config.redis.clone()).await?;
        let storage = Arc::new(MemoryStorage::new());
        let dyn_storage: Arc<dyn ImageStorage> = storage.clone();

        let state = AppState::new(
            db.clone(),
            redis.clone(),
            dyn_storage,
            Mailer::disabled(),
            config.clone(),
        );
        let app = build_router(state);

        let user = insert_user(&db, &config, Role::User, true).await?;

        Ok(TestContext {
            db,
            redis,
            storage,
            app,
            config,
            created: std::sync::Mutex::new(vec![user.id()]),
            user,
        })
    }

    /// Creates another confirmed user with the given role
    pub async fn create_user(&self, role: Role) -> anyhow::Result<TestUser> {
        let user = insert_user(&self.db, &self.config, role, true).await?;
        self.track(user.id());
        Ok(user)
    }

    /// Creates a user who has not confirmed their email yet
    pub async fn create_unconfirmed_user(&self) -> anyhow::Result<TestUser> {
        let user = insert_user(&self.db, &self.config, Role::User, false).await?;
        self.track(user.id());
        Ok(user)
    }

    /// Registers a user created through the API for cleanup
    pub fn track(&self, user_id: Uuid) {
        if let Ok(mut created) = self.created.lock() {
            created.push(user_id);
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Sends a request, returning the status and the JSON body (Null if empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// JSON request with an optional bearer token
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Multipart request with text fields and at most one file
    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();

        self.send(request).await
    }

    /// Uploads a picture as `owner` and returns its ID
    pub async fn upload_image(&self, owner: &TestUser, description: &str, tags: &str) -> Uuid {
        let (status, body) = self
            .multipart(
                Method::POST,
                "/api/pictures",
                &owner.access_token,
                &[("description", description), ("tags", tags)],
                Some(("image_file", &b"fake image bytes"[..])),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Deletes every user created by this context (images and comments cascade)
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        let ids = self
            .created
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default();

        for id in ids {
            User::delete(&self.db, id).await?;
            UserCache::new(self.redis.clone()).invalidate(id).await?;
        }

        Ok(())
    }
}

/// Unique email for a test account
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4())
}

/// Unique username within the 6..=12 character limit
pub fn unique_username() -> String {
    format!("u{}", &Uuid::new_v4().simple().to_string()[..10])
}

fn test_config(limits: LimitsConfig) -> anyhow::Result<Config> {
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for integration tests"))?;

    Ok(Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            lifetimes: TokenLifetimes::default(),
        },
        redis: RedisConfig::from_env()?,
        cloudinary: CloudinaryConfig::new(
            "test".to_string(),
            "key".to_string(),
            "secret".to_string(),
        ),
        email: None,
        limits,
    })
}

async fn insert_user(
    db: &PgPool,
    config: &Config,
    role: Role,
    confirmed: bool,
) -> anyhow::Result<TestUser> {
    let mut user = User::create(
        db,
        CreateUser {
            username: unique_username(),
            email: unique_email(),
            password_hash: hash_password(TEST_PASSWORD)?,
            avatar_url: None,
        },
    )
    .await?;

    if confirmed {
        User::confirm_email(db, user.id).await?;
        user.confirmed = true;
    }

    if user.role != role {
        if let Some(updated) = User::set_role(db, user.id, role).await? {
            user = updated;
        }
    }

    let pair = jwt::issue_token_pair(user.id, &config.jwt.secret, &config.jwt.lifetimes)?;
    User::update_refresh_token(db, user.id, Some(&pair.refresh_token)).await?;

    Ok(TestUser {
        user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
