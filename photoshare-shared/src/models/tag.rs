/// Tag model
///
/// Tags are unique by name and attached to images through `image_tags`.
/// An image carries at most [`MAX_TAGS_PER_IMAGE`] tags.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Maximum number of tags attached to one image
pub const MAX_TAGS_PER_IMAGE: usize = 5;

/// Maximum length of a single tag name
pub const MAX_TAG_LENGTH: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// Extracts tags from free text
///
/// Only words starting with `#` count. The `#` is stripped, names are
/// lower-cased and de-duplicated, names longer than [`MAX_TAG_LENGTH`] are
/// dropped and at most [`MAX_TAGS_PER_IMAGE`] are kept, in input order.
///
/// ```
/// use photoshare_shared::models::tag::parse_tags;
///
/// assert_eq!(parse_tags("#Sea sunset #beach #sea"), vec!["sea", "beach"]);
/// ```
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for word in input.split_whitespace() {
        let Some(name) = word.strip_prefix('#') else {
            continue;
        };
        let name = name.trim_start_matches('#').to_lowercase();

        if name.is_empty() || name.chars().count() > MAX_TAG_LENGTH || tags.contains(&name) {
            continue;
        }

        tags.push(name);
        if tags.len() == MAX_TAGS_PER_IMAGE {
            break;
        }
    }

    tags
}

impl Tag {
    /// Inserts the tag if missing and returns it
    pub async fn upsert(tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
    }

    /// Links a tag to an image; linking twice is a no-op
    pub async fn attach(
        tx: &mut Transaction<'_, Postgres>,
        image_id: Uuid,
        tag_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO image_tags (image_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(image_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Lists tag names of an image, alphabetically
    pub async fn names_for_image(pool: &PgPool, image_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM tags t
            JOIN image_tags it ON it.tag_id = t.id
            WHERE it.image_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(image_id)
        .fetch_all(pool)
        .await
    }

    /// Finds a tag by name
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }
}
