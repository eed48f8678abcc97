/// Image model and database operations
///
/// Images belong to the user who uploaded them. All lookups used by the API
/// are scoped to the owner: a missing image and someone else's image look the
/// same to the caller.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE images (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     image_url VARCHAR(1024) NOT NULL,
///     qr_code_url VARCHAR(1024),
///     public_id VARCHAR(255) NOT NULL,
///     description VARCHAR(500) NOT NULL DEFAULT '',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::tag::{Tag, MAX_TAGS_PER_IMAGE};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Delivery URL, possibly including transformations
    pub image_url: String,

    /// URL of the uploaded QR code pointing at `image_url`
    pub qr_code_url: Option<String>,

    /// Identifier of the asset in the cloud image service
    pub public_id: String,

    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An image together with its tag names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageWithTags {
    #[serde(flatten)]
    pub image: Image,
    pub tags: Vec<String>,
}

/// Input for creating an image
#[derive(Debug, Clone)]
pub struct CreateImage {
    pub user_id: Uuid,
    pub image_url: String,
    pub public_id: String,
    pub description: String,

    /// Already-parsed tag names; anything past the fifth is ignored
    pub tags: Vec<String>,
}

const IMAGE_COLUMNS: &str =
    "id, user_id, image_url, qr_code_url, public_id, description, created_at, updated_at";

impl Image {
    /// Creates the image row and attaches its tags in one transaction
    pub async fn create(pool: &PgPool, data: CreateImage) -> Result<ImageWithTags, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            INSERT INTO images (user_id, image_url, public_id, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.image_url)
        .bind(data.public_id)
        .bind(data.description)
        .fetch_one(&mut *tx)
        .await?;

        let mut tags = Vec::new();
        for name in data.tags.into_iter().take(MAX_TAGS_PER_IMAGE) {
            let tag = Tag::upsert(&mut tx, &name).await?;
            Tag::attach(&mut tx, image.id, tag.id).await?;
            tags.push(tag.name);
        }

        tx.commit().await?;

        tags.sort();
        Ok(ImageWithTags { image, tags })
    }

    /// Finds an image by ID regardless of owner
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an image owned by `user_id`
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Finds an image owned by `user_id` by its current URL
    pub async fn find_by_url_for_user(
        pool: &PgPool,
        image_url: &str,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE image_url = $1 AND user_id = $2"
        ))
        .bind(image_url)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a user's images, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}
            FROM images
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Deletes an image owned by `user_id`, returning the deleted row
    pub async fn delete_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            "DELETE FROM images WHERE id = $1 AND user_id = $2 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Replaces the description of an owned image
    pub async fn update_description(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        description: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            r#"
            UPDATE images SET description = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(description)
        .fetch_optional(pool)
        .await
    }

    /// Replaces the delivery URL, e.g. after a transformation
    ///
    /// The QR code pointed at the old URL, so it is cleared.
    pub async fn update_url(
        pool: &PgPool,
        id: Uuid,
        image_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            r#"
            UPDATE images SET image_url = $2, qr_code_url = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(image_url)
        .fetch_optional(pool)
        .await
    }

    /// Stores the QR code URL
    pub async fn update_qr_code(
        pool: &PgPool,
        id: Uuid,
        qr_code_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Image>(&format!(
            r#"
            UPDATE images SET qr_code_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(qr_code_url)
        .fetch_optional(pool)
        .await
    }

    /// Loads the tag names and pairs them with the image
    pub async fn with_tags(self, pool: &PgPool) -> Result<ImageWithTags, sqlx::Error> {
        let tags = Tag::names_for_image(pool, self.id).await?;
        Ok(ImageWithTags { image: self, tags })
    }
}
