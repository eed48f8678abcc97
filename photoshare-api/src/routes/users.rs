/// User endpoints
///
/// All routes require authentication; `ban` and `role` are admin only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{MessageResponse, MultipartForm},
};
use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use photoshare_shared::{
    auth::{
        authorization::{require_admin, require_not_self},
        middleware::AuthContext,
    },
    cloud::Transformation,
    models::user::{Role, UpdateProfile, User, UserProfile},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Avatar edge length in pixels
const AVATAR_SIZE: u32 = 250;

/// Public profile of another user
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfile {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub images_count: i64,
}

/// Profile edit body; blank strings keep the current value
#[derive(Debug, Deserialize)]
pub struct EditProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Validate)]
struct ProfileChanges {
    #[validate(length(min = 6, max = 12, message = "Username must be 6-12 characters"))]
    username: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BanResponse {
    pub user: UserProfile,
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub email: String,
    pub role: Role,
}

/// Current user
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<UserProfile> {
    Json(UserProfile::from(&auth.user))
}

/// Updates username and/or email
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EditProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let mut changes = UpdateProfile::from_form(req.username, req.email);
    changes.email = changes.email.map(|email| email.to_lowercase());

    ProfileChanges {
        username: changes.username.clone(),
        email: changes.email.clone(),
    }
    .validate()?;

    if changes.is_empty() {
        return Ok(Json(UserProfile::from(&auth.user)));
    }

    let user = User::update_profile(&state.db, auth.user_id(), changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    state.forget_user(user.id).await;

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(UserProfile::from(&user)))
}

/// Replaces the avatar with an uploaded image
///
/// Stored under a fixed public ID per user, so a new upload overwrites the
/// previous avatar.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<Json<UserProfile>> {
    let mut form = MultipartForm::read(multipart).await?;
    let data = form.file("file")?;

    let public_id = avatar_public_id(auth.user_id());
    let uploaded = state.storage.upload(data, &public_id, true).await?;

    let avatar_url = state.storage.url_for(
        &uploaded.public_id,
        Some(uploaded.version),
        &[avatar_transformation()],
    );

    let user = User::update_avatar(&state.db, auth.user_id(), &avatar_url)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    state.forget_user(user.id).await;

    tracing::info!(user_id = %user.id, "Avatar updated");

    Ok(Json(UserProfile::from(&user)))
}

/// Public profile by username
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<PublicProfile>> {
    let user = User::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let images_count = User::count_images(&state.db, user.id).await?;

    Ok(Json(PublicProfile {
        username: user.username,
        created_at: user.created_at,
        images_count,
    }))
}

/// Bans a user (admin only)
///
/// Banned users keep their data but every authenticated request, login and
/// token refresh answers 403.
pub async fn ban_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<BanResponse>> {
    require_admin(&auth)?;
    require_not_self(&auth, user_id)?;

    let user = User::set_active(&state.db, user_id, false)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    state.forget_user(user.id).await;

    tracing::info!(admin_id = %auth.user_id(), user_id = %user.id, "User banned");

    Ok(Json(BanResponse {
        user: UserProfile::from(&user),
        detail: "User successfully banned".to_string(),
    }))
}

/// Changes a user's role (admin only)
pub async fn change_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_admin(&auth)?;

    let target = User::find_by_email(&state.db, &req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    require_not_self(&auth, target.id)?;

    let user = User::set_role(&state.db, target.id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    state.forget_user(user.id).await;

    tracing::info!(
        admin_id = %auth.user_id(),
        user_id = %user.id,
        role = user.role.as_str(),
        "Role changed"
    );

    Ok(Json(MessageResponse::new(format!(
        "{} is now {}",
        user.email,
        user.role.as_str()
    ))))
}

fn avatar_public_id(user_id: Uuid) -> String {
    format!("photo_share/avatars/{}", user_id)
}

fn avatar_transformation() -> Transformation {
    Transformation::new()
        .width(AVATAR_SIZE)
        .height(AVATAR_SIZE)
        .crop("fill")
}
