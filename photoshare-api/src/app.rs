/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use photoshare_api::{app::AppState, config::Config};
/// use photoshare_shared::cloud::{CloudinaryStorage, ImageStorage};
/// use photoshare_shared::mail::Mailer;
/// use photoshare_shared::redis::RedisClient;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let redis = RedisClient::new(config.redis.clone()).await?;
/// let storage: Arc<dyn ImageStorage> =
///     Arc::new(CloudinaryStorage::new(config.cloudinary.clone())?);
/// let mailer = Mailer::new(config.email.clone())?;
///
/// let state = AppState::new(pool, redis, storage, mailer, config);
/// let app = photoshare_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::{rate_limit::signup_rate_limit, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use photoshare_shared::{
    auth::{
        jwt::{self, TokenLifetimes},
        middleware::{bearer_token, AuthContext, AuthError},
    },
    cloud::ImageStorage,
    mail::Mailer,
    models::user::User,
    redis::{RedisClient, TokenBlocklist, UserCache, UserCacheConfig},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every
/// field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: RedisClient,
    pub blocklist: TokenBlocklist,
    pub user_cache: UserCache,
    pub storage: Arc<dyn ImageStorage>,
    pub mailer: Mailer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        redis: RedisClient,
        storage: Arc<dyn ImageStorage>,
        mailer: Mailer,
        config: Config,
    ) -> Self {
        let user_cache = UserCache::with_config(
            redis.clone(),
            UserCacheConfig {
                ttl_seconds: config.limits.user_cache_ttl_secs,
            },
        );

        Self {
            db,
            blocklist: TokenBlocklist::new(redis.clone()),
            user_cache,
            redis,
            storage,
            mailer,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn token_lifetimes(&self) -> &TokenLifetimes {
        &self.config.jwt.lifetimes
    }

    /// Loads a user through the cache
    ///
    /// A cache failure is logged and the database answers instead. The fill
    /// is skipped when the user was invalidated during the lookup.
    pub async fn load_user(&self, user_id: Uuid) -> ApiResult<Option<User>> {
        match self.user_cache.get(user_id).await {
            Ok(Some(user)) => return Ok(Some(user)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "User cache read failed, using database");
            }
        }

        let generation = match self.user_cache.generation(user_id).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "User cache unavailable, not filling");
                None
            }
        };

        let user = User::find_by_id(&self.db, user_id).await?;

        if let (Some(user), Some(generation)) = (&user, generation) {
            match self.user_cache.put_if_current(user, generation).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(%user_id, "User changed during load, not cached"),
                Err(e) => tracing::warn!(error = %e, %user_id, "User cache write failed"),
            }
        }

        Ok(user)
    }

    /// Drops the cached copy of a user after the row changed
    pub async fn forget_user(&self, user_id: Uuid) {
        if let Err(e) = self.user_cache.invalidate(user_id).await {
            tracing::warn!(error = %e, %user_id, "User cache invalidation failed");
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /api
/// ├── GET  /healthchecker
/// ├── /auth
/// │   ├── POST /signup                  (rate limited)
/// │   ├── POST /login                   (form)
/// │   ├── POST /logout                  (auth)
/// │   ├── GET  /refresh_token           (refresh token as bearer)
/// │   ├── GET  /confirmed_email/:token
/// │   └── POST /request_email
/// ├── /users                            (auth)
/// │   ├── GET   /me
/// │   ├── PUT   /edit
/// │   ├── PATCH /avatar                 (multipart)
/// │   ├── GET   /profile/:username
/// │   ├── PATCH /ban/:user_id           (admin)
/// │   └── PATCH /role                   (admin)
/// ├── /pictures                         (auth)
/// │   ├── POST, GET /
/// │   ├── GET, DELETE /:image_id
/// │   ├── PATCH /:image_id/description
/// │   ├── POST  /:image_id/transform
/// │   └── POST  /:image_id/qr_code
/// └── /comments                         (auth)
///     ├── POST /:image_id, GET|PUT|DELETE /:comment_id
///     ├── GET  /author/:user_id
///     ├── GET  /image_by_author/:user_id/:image_id
///     └── GET  /image/:image_id
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, tracing, compression, body
/// size limit, then per-route JWT authentication and signup rate limiting.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route(
            "/signup",
            post(routes::auth::signup)
                .layer(from_fn_with_state(state.clone(), signup_rate_limit)),
        )
        .route("/login", post(routes::auth::login))
        .route(
            "/logout",
            post(routes::auth::logout).layer(from_fn_with_state(state.clone(), jwt_auth_layer)),
        )
        .route("/refresh_token", get(routes::auth::refresh_token))
        .route("/confirmed_email/:token", get(routes::auth::confirmed_email))
        .route("/request_email", post(routes::auth::request_email));

    let user_routes = Router::new()
        .route("/me", get(routes::users::me))
        .route("/edit", put(routes::users::edit_profile))
        .route("/avatar", patch(routes::users::update_avatar))
        .route("/profile/:username", get(routes::users::profile))
        .route("/ban/:user_id", patch(routes::users::ban_user))
        .route("/role", patch(routes::users::change_role))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let picture_routes = Router::new()
        .route(
            "/",
            post(routes::pictures::create_image).get(routes::pictures::list_images),
        )
        .route(
            "/:image_id",
            get(routes::pictures::get_image).delete(routes::pictures::delete_image),
        )
        .route(
            "/:image_id/description",
            patch(routes::pictures::update_description),
        )
        .route("/:image_id/transform", post(routes::pictures::transform_image))
        .route("/:image_id/qr_code", post(routes::pictures::create_qr_code))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let comment_routes = Router::new()
        .route(
            "/:id",
            post(routes::comments::create_comment)
                .get(routes::comments::get_comment)
                .put(routes::comments::edit_comment)
                .delete(routes::comments::delete_comment),
        )
        .route("/author/:user_id", get(routes::comments::list_by_author))
        .route(
            "/image_by_author/:user_id/:image_id",
            get(routes::comments::list_by_author_and_image),
        )
        .route("/image/:image_id", get(routes::comments::list_by_image))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let api_routes = Router::new()
        .route("/healthchecker", get(routes::health::health_check))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/pictures", picture_routes)
        .nest("/comments", comment_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.limits.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// 1. Bearer token from `Authorization`
/// 2. Signature, expiry, issuer and `token_type == access`
/// 3. Blocklist lookup; Redis errors reject the request (503)
/// 4. Current user from cache or database; banned users get 403
///
/// On success an [`AuthContext`] is inserted into the request extensions.
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    if state.blocklist.is_revoked(claims.jti).await? {
        tracing::debug!(jti = %claims.jti, "Rejected revoked token");
        return Err(AuthError::InvalidToken("Token has been revoked".to_string()).into());
    }

    let user = state
        .load_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    if !user.is_active {
        return Err(AuthError::Inactive.into());
    }

    req.extensions_mut().insert(AuthContext::new(user, &claims));

    Ok(next.run(req).await)
}
