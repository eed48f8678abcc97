/// API route handlers
///
/// Organized by resource:
///
/// - `health`: health check
/// - `auth`: signup, login, logout, token refresh, email confirmation
/// - `users`: profile, avatar, bans and roles
/// - `pictures`: image upload, listing, transformations and QR codes
/// - `comments`: comments on images

pub mod auth;
pub mod comments;
pub mod health;
pub mod pictures;
pub mod users;

use crate::error::{ApiError, ApiResult};
use axum::extract::Multipart;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `{"message": "..."}` body used by several endpoints
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Upload fields read as bytes even when the client sends no file name
const FILE_FIELDS: [&str; 2] = ["image_file", "file"];

/// A fully read multipart body
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub text: HashMap<String, String>,
    pub files: HashMap<String, Bytes>,
}

impl MultipartForm {
    /// Reads every field
    ///
    /// Parts with a file name, and the known upload fields, are kept as
    /// bytes. Everything else must be UTF-8 text.
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if field.file_name().is_some() || FILE_FIELDS.contains(&name.as_str()) {
                form.files.insert(name, field.bytes().await?);
            } else {
                form.text.insert(name, field.text().await?);
            }
        }

        Ok(form)
    }

    /// Takes a required file part
    pub fn file(&mut self, name: &str) -> ApiResult<Bytes> {
        self.files
            .remove(name)
            .filter(|data| !data.is_empty())
            .ok_or_else(|| ApiError::invalid_field(name, "File is required"))
    }

    /// Takes an optional text part
    pub fn text(&mut self, name: &str) -> Option<String> {
        self.text.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
    };

    const BOUNDARY: &str = "photoshare-boundary";

    async fn multipart(body: Vec<u8>) -> Multipart {
        let request = Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    fn part(name: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"", name),
        };

        let mut out = format!("--{}\r\n{}\r\n\r\n", BOUNDARY, disposition).into_bytes();
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
        out
    }

    fn finish(mut body: Vec<u8>) -> Vec<u8> {
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    #[tokio::test]
    async fn test_upload_field_without_file_name_is_bytes() {
        let png = [0x89, b'P', b'N', b'G', 0xff, 0xfe];
        let mut body = part("description", None, b"sunset");
        body.extend(part("image_file", None, &png));

        let mut form = MultipartForm::read(multipart(finish(body)).await)
            .await
            .unwrap();

        assert_eq!(form.file("image_file").unwrap().as_ref(), &png);
        assert_eq!(form.text("description").as_deref(), Some("sunset"));
    }

    #[tokio::test]
    async fn test_named_file_part_and_missing_file() {
        let body = finish(part("avatar", Some("me.png"), b"\x89PNG"));
        let mut form = MultipartForm::read(multipart(body).await).await.unwrap();

        assert!(form.files.contains_key("avatar"));
        assert!(matches!(
            form.file("file"),
            Err(ApiError::ValidationError(details)) if details[0].field == "file"
        ));
    }
}
