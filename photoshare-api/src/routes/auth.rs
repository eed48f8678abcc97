/// Authentication endpoints
///
/// - `POST /api/auth/signup`: create an account (rate limited)
/// - `POST /api/auth/login`: form login, returns a token pair
/// - `POST /api/auth/logout`: revoke the current access token
/// - `GET /api/auth/refresh_token`: rotate tokens using the refresh token
/// - `GET /api/auth/confirmed_email/:token`: confirm an email address
/// - `POST /api/auth/request_email`: resend the confirmation email
///
/// # Refresh token rotation
///
/// Only the most recently issued refresh token is stored on the user row.
/// Presenting any other (still valid) refresh token clears the stored one,
/// which forces a fresh login on every client holding a token for that
/// account.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Form, Json,
};
use photoshare_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::{bearer_token, AuthContext, AuthError},
        password::{hash_password, verify_password},
    },
    models::user::{gravatar_url, CreateUser, User, UserProfile},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 6, max = 12, message = "Username must be 6-12 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 20, message = "Password must be 6-20 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user: UserProfile,
    pub detail: String,
}

/// OAuth2-style password form; `username` carries the email address
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestEmail {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Signup handler
///
/// Creates the account with a Gravatar avatar. The first account ever
/// created becomes an admin. Login is refused until the email is confirmed.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();

    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict("Account already exists".to_string()));
    }

    let password_hash = hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username,
            avatar_url: Some(gravatar_url(&email)),
            email,
            password_hash,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User signed up");

    send_confirmation(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: UserProfile::from(&user),
            detail: "User successfully created".to_string(),
        }),
    ))
}

/// Login handler
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let email = form.username.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email".to_string()))?;

    if !user.confirmed {
        return Err(ApiError::Unauthorized("Email not confirmed".to_string()));
    }

    if !user.is_active {
        return Err(AuthError::Inactive.into());
    }

    if !verify_password(&form.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let pair = jwt::issue_token_pair(user.id, state.jwt_secret(), state.token_lifetimes())?;
    User::update_refresh_token(&state.db, user.id, Some(&pair.refresh_token)).await?;
    state.forget_user(user.id).await;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(pair.into()))
}

/// Logout handler
///
/// The access token's `jti` stays on the blocklist for the token's
/// remaining lifetime.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    let ttl = auth.token_ttl().num_seconds().max(1) as u64;
    state.blocklist.revoke(auth.token_id, ttl).await?;

    User::update_refresh_token(&state.db, auth.user_id(), None).await?;
    state.forget_user(auth.user_id()).await;

    tracing::info!(user_id = %auth.user_id(), jti = %auth.token_id, "User logged out");

    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// Refresh handler
///
/// Expects the refresh token as the bearer credential.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let token = bearer_token(&headers)?;
    let claims = jwt::validate_refresh_token(token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    if user.refresh_token.as_deref() != Some(token) {
        tracing::warn!(user_id = %user.id, "Refresh token reuse detected");
        User::update_refresh_token(&state.db, user.id, None).await?;
        state.forget_user(user.id).await;
        return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
    }

    if !user.is_active {
        return Err(AuthError::Inactive.into());
    }

    let pair = jwt::issue_token_pair(user.id, state.jwt_secret(), state.token_lifetimes())?;
    User::update_refresh_token(&state.db, user.id, Some(&pair.refresh_token)).await?;
    state.forget_user(user.id).await;

    Ok(Json(pair.into()))
}

/// Email confirmation handler
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = jwt::validate_email_token(&token, state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected email verification token");
        ApiError::BadRequest("Invalid token for email verification".to_string())
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Verification error".to_string()))?;

    if user.confirmed {
        return Ok(Json(MessageResponse::new("Your email is already confirmed")));
    }

    User::confirm_email(&state.db, user.id).await?;
    state.forget_user(user.id).await;

    tracing::info!(user_id = %user.id, "Email confirmed");

    Ok(Json(MessageResponse::new("Email confirmed")))
}

/// Resends the confirmation email
///
/// Answers the same way for unknown addresses so the endpoint cannot be
/// used to discover which emails have accounts.
pub async fn request_email(
    State(state): State<AppState>,
    Json(req): Json<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();

    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if user.confirmed {
            return Ok(Json(MessageResponse::new("Your email is already confirmed")));
        }

        send_confirmation(&state, &user)?;
    }

    Ok(Json(MessageResponse::new("Check your email for confirmation.")))
}

/// Issues a verification token and mails it from a background task
fn send_confirmation(state: &AppState, user: &User) -> ApiResult<()> {
    let token = jwt::issue_email_token(user.id, state.jwt_secret(), state.token_lifetimes())?;
    let confirm_url = state.config.confirmation_url(&token);

    let mailer = state.mailer.clone();
    let user_id = user.id;
    let to = user.email.clone();
    let username = user.username.clone();

    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_confirmation_email(&to, &username, &confirm_url)
            .await
        {
            tracing::error!(error = %e, %user_id, "Failed to send confirmation email");
        }
    });

    Ok(())
}
