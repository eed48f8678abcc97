/// Comment model and database operations
///
/// Who may edit or delete a comment is decided by the caller
/// (see [`crate::auth::authorization`]); these functions only run queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Maximum comment length in characters
pub const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub user_id: Uuid,
    pub image_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub text: String,
    pub user_id: Uuid,
    pub image_id: Uuid,
}

const COMMENT_COLUMNS: &str = "id, text, user_id, image_id, created_at, updated_at";

impl Comment {
    pub async fn create(pool: &PgPool, data: CreateComment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (text, user_id, image_id)
            VALUES ($1, $2, $3)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(data.text)
        .bind(data.user_id)
        .bind(data.image_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a comment only if `user_id` wrote it
    pub async fn find_by_id_for_author(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Replaces the text and bumps `updated_at`
    pub async fn update_text(
        pool: &PgPool,
        id: Uuid,
        text: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments SET text = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(text)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a comment, returning the deleted row
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "DELETE FROM comments WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All comments written by a user, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Comments a user left on one image
    pub async fn list_by_user_and_image(
        pool: &PgPool,
        user_id: Uuid,
        image_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS} FROM comments
            WHERE user_id = $1 AND image_id = $2
            ORDER BY created_at, id
            "#
        ))
        .bind(user_id)
        .bind(image_id)
        .fetch_all(pool)
        .await
    }

    /// All comments on an image
    pub async fn list_by_image(pool: &PgPool, image_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE image_id = $1 ORDER BY created_at, id"
        ))
        .bind(image_id)
        .fetch_all(pool)
        .await
    }
}
