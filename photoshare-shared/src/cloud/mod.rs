/// Cloud image storage
///
/// Uploaded images, avatars and QR codes are stored in a third-party image
/// service. The rest of the code talks to it through the [`ImageStorage`]
/// trait:
///
/// - [`cloudinary::CloudinaryStorage`]: the real service (signed REST calls)
/// - [`memory::MemoryStorage`]: in-process store for tests
///
/// Transformations (crop, effects, rotation) are not applied by us. They
/// are encoded in the delivery URL and rendered by the service on request,
/// see [`transform`].

pub mod cloudinary;
pub mod memory;
pub mod transform;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub use cloudinary::{CloudinaryConfig, CloudinaryStorage};
pub use memory::MemoryStorage;
pub use transform::Transformation;

/// Folder for uploaded pictures
pub const IMAGE_FOLDER: &str = "photo_share";

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Request could not be sent or the connection failed
    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error
    #[error("Storage service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The service answered with something we could not understand
    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),

    /// Upload body was empty
    #[error("Empty upload")]
    EmptyUpload,
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedImage {
    pub public_id: String,
    pub version: u64,
    pub secure_url: String,
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Uploads raw image bytes under `public_id`
    async fn upload(
        &self,
        data: Bytes,
        public_id: &str,
        overwrite: bool,
    ) -> Result<UploadedImage, StorageError>;

    /// Removes an asset; removing a missing asset is not an error
    async fn destroy(&self, public_id: &str) -> Result<(), StorageError>;

    /// Builds a delivery URL applying `transformations` in order
    fn url_for(
        &self,
        public_id: &str,
        version: Option<u64>,
        transformations: &[Transformation],
    ) -> String;
}

/// Generates a fresh `"{folder}/{sha256(uuid v4)}"` public ID
pub fn generate_public_id(folder: &str) -> String {
    let digest = Sha256::digest(Uuid::new_v4().to_string().as_bytes());
    format!("{}/{}", folder, hex::encode(digest))
}
