/// Picture endpoints
///
/// Every route works on the caller's own images only; an image owned by
/// someone else answers 404, same as a missing one.
///
/// # Upload
///
/// ```text
/// POST /api/pictures
/// Content-Type: multipart/form-data
///
/// description=<text, up to 500 chars>
/// tags=#sunset #beach        (optional, at most 5 are kept)
/// image_file=<binary>
/// ```
///
/// The file goes to the image service under a random public ID in the
/// `photo_share` folder; the row stores the delivery URL.
///
/// # Transformations
///
/// Transformations never touch the stored asset. The selected sections are
/// turned into a transformation chain that is encoded in a new delivery
/// URL, which replaces `image_url`. The previous QR code is dropped since it
/// pointed at the old URL.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MultipartForm,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use photoshare_shared::{
    auth::middleware::AuthContext,
    cloud::{generate_public_id, transform::EditImageRequest, IMAGE_FOLDER},
    models::{
        image::{CreateImage, Image, ImageWithTags},
        tag::parse_tags,
    },
    qr,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Pagination for the image list
#[derive(Debug, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "Offset must not be negative"))]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, Validate)]
pub struct DescriptionRequest {
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
}

/// Uploads a new picture
pub async fn create_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImageWithTags>)> {
    let mut form = MultipartForm::read(multipart).await?;

    let description = form.text("description").unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::invalid_field(
            "description",
            "Description must be at most 500 characters",
        ));
    }

    let tags = form.text("tags").map(|raw| parse_tags(&raw)).unwrap_or_default();
    let data = form.file("image_file")?;

    let public_id = generate_public_id(IMAGE_FOLDER);
    let uploaded = state.storage.upload(data, &public_id, false).await?;
    let image_url = state
        .storage
        .url_for(&uploaded.public_id, Some(uploaded.version), &[]);

    let image = Image::create(
        &state.db,
        CreateImage {
            user_id: auth.user_id(),
            image_url,
            public_id: uploaded.public_id,
            description,
            tags,
        },
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id(),
        image_id = %image.image.id,
        tags = image.tags.len(),
        "Image uploaded"
    );

    Ok((StatusCode::CREATED, Json(image)))
}

/// Lists the caller's images, newest first
pub async fn list_images(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ImageWithTags>>> {
    query.validate()?;

    let images = Image::list_by_user(&state.db, auth.user_id(), query.limit, query.offset).await?;

    let mut result = Vec::with_capacity(images.len());
    for image in images {
        result.push(image.with_tags(&state.db).await?);
    }

    Ok(Json(result))
}

pub async fn get_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Json<ImageWithTags>> {
    let image = find_own(&state, image_id, auth.user_id()).await?;
    Ok(Json(image.with_tags(&state.db).await?))
}

/// Deletes an image and its stored assets
///
/// The row goes first; failing to remove the cloud asset is only logged.
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let image = Image::delete_for_user(&state.db, image_id, auth.user_id())
        .await?
        .ok_or_else(image_not_found)?;

    if let Err(e) = state.storage.destroy(&image.public_id).await {
        tracing::warn!(error = %e, public_id = %image.public_id, "Failed to destroy image asset");
    }

    if image.qr_code_url.is_some() {
        let qr_id = qr_public_id(image.id);
        if let Err(e) = state.storage.destroy(&qr_id).await {
            tracing::warn!(error = %e, public_id = %qr_id, "Failed to destroy QR code asset");
        }
    }

    tracing::info!(user_id = %auth.user_id(), %image_id, "Image deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_description(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
    Json(req): Json<DescriptionRequest>,
) -> ApiResult<Json<ImageWithTags>> {
    req.validate()?;

    let image = Image::update_description(&state.db, image_id, auth.user_id(), &req.description)
        .await?
        .ok_or_else(image_not_found)?;

    Ok(Json(image.with_tags(&state.db).await?))
}

/// Applies the selected transformations to an image
pub async fn transform_image(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
    Json(req): Json<EditImageRequest>,
) -> ApiResult<Json<ImageWithTags>> {
    req.validate()?;

    let chain = req.transformations();
    if chain.is_empty() {
        return Err(ApiError::BadRequest(
            "No transformation selected".to_string(),
        ));
    }

    let image = find_own(&state, image_id, auth.user_id()).await?;
    let url = state.storage.url_for(&image.public_id, None, &chain);

    let image = Image::update_url(&state.db, image.id, &url)
        .await?
        .ok_or_else(image_not_found)?;

    tracing::info!(%image_id, steps = chain.len(), "Image transformed");

    Ok(Json(image.with_tags(&state.db).await?))
}

/// Renders a QR code for the image URL and stores it
pub async fn create_qr_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Json<ImageWithTags>> {
    let image = find_own(&state, image_id, auth.user_id()).await?;

    let png = qr::render_png(&image.image_url)?;
    let uploaded = state
        .storage
        .upload(png.into(), &qr_public_id(image.id), true)
        .await?;
    let qr_url = state
        .storage
        .url_for(&uploaded.public_id, Some(uploaded.version), &[]);

    let image = Image::update_qr_code(&state.db, image.id, &qr_url)
        .await?
        .ok_or_else(image_not_found)?;

    Ok(Json(image.with_tags(&state.db).await?))
}

async fn find_own(state: &AppState, image_id: Uuid, user_id: Uuid) -> ApiResult<Image> {
    Image::find_for_user(&state.db, image_id, user_id)
        .await?
        .ok_or_else(image_not_found)
}

fn image_not_found() -> ApiError {
    ApiError::NotFound("Image not found".to_string())
}

fn qr_public_id(image_id: Uuid) -> String {
    format!("{}/qr/{}", IMAGE_FOLDER, image_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_bounds() {
        let default = ListQuery {
            limit: default_limit(),
            offset: 0,
        };
        assert!(default.validate().is_ok());
        assert_eq!(default.limit, 10);

        let too_many = ListQuery {
            limit: 51,
            offset: 0,
        };
        assert!(too_many.validate().is_err());

        let zero = ListQuery { limit: 0, offset: 0 };
        assert!(zero.validate().is_err());

        let negative = ListQuery {
            limit: 10,
            offset: -1,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_description_length() {
        let ok = DescriptionRequest {
            description: "a".repeat(MAX_DESCRIPTION_LENGTH),
        };
        assert!(ok.validate().is_ok());

        let long = DescriptionRequest {
            description: "a".repeat(MAX_DESCRIPTION_LENGTH + 1),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_qr_public_id() {
        assert_eq!(
            qr_public_id(Uuid::nil()),
            "photo_share/qr/00000000-0000-0000-0000-000000000000"
        );
    }
}
