/// Comment endpoints
///
/// Anyone signed in may comment on any image. Authors and staff may edit a
/// comment; only staff (admins and moderators) may delete one.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use photoshare_shared::{
    auth::{
        authorization::{require_comment_editor, require_staff},
        middleware::AuthContext,
    },
    models::{
        comment::{Comment, CreateComment},
        image::Image,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 500, message = "Comment must be 1-500 characters"))]
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CommentResponse {
    pub id: Uuid,
    pub comment: String,
    pub user_id: Uuid,
    pub image_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            comment: comment.text,
            user_id: comment.user_id,
            image_id: comment.image_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

fn into_responses(comments: Vec<Comment>) -> Json<Vec<CommentResponse>> {
    Json(comments.into_iter().map(CommentResponse::from).collect())
}

fn comment_not_found() -> ApiError {
    ApiError::NotFound("Comment not found".to_string())
}

/// Comments on an image
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let text = validated_text(req)?;

    if Image::find_by_id(&state.db, image_id).await?.is_none() {
        return Err(ApiError::NotFound("Image not found".to_string()));
    }

    let comment = Comment::create(
        &state.db,
        CreateComment {
            text,
            user_id: auth.user_id(),
            image_id,
        },
    )
    .await?;

    tracing::debug!(comment_id = %comment.id, %image_id, "Comment created");

    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// The caller's own comment
pub async fn get_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = Comment::find_by_id_for_author(&state.db, comment_id, auth.user_id())
        .await?
        .ok_or_else(comment_not_found)?;

    Ok(Json(comment.into()))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let text = validated_text(req)?;

    let existing = Comment::find_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(comment_not_found)?;

    require_comment_editor(&auth, existing.user_id)?;

    let comment = Comment::update_text(&state.db, comment_id, &text)
        .await?
        .ok_or_else(comment_not_found)?;

    Ok(Json(comment.into()))
}

/// Removes a comment (staff only)
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    require_staff(&auth)?;

    let comment = Comment::delete(&state.db, comment_id)
        .await?
        .ok_or_else(comment_not_found)?;

    tracing::info!(
        moderator_id = %auth.user_id(),
        %comment_id,
        author_id = %comment.user_id,
        "Comment deleted"
    );

    Ok(Json(comment.into()))
}

pub async fn list_by_author(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    Ok(into_responses(Comment::list_by_user(&state.db, user_id).await?))
}

pub async fn list_by_author_and_image(
    State(state): State<AppState>,
    Path((user_id, image_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    Ok(into_responses(
        Comment::list_by_user_and_image(&state.db, user_id, image_id).await?,
    ))
}

pub async fn list_by_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    Ok(into_responses(Comment::list_by_image(&state.db, image_id).await?))
}

/// Validates and trims the comment text; whitespace-only text is rejected
fn validated_text(req: CommentRequest) -> ApiResult<String> {
    req.validate()?;

    let text = req.comment.trim();
    if text.is_empty() {
        return Err(ApiError::invalid_field("comment", "Comment must not be blank"));
    }

    Ok(text.to_string())
}
