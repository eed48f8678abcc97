/// In-memory image storage used by tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::transform::chain_to_path;
use super::{ImageStorage, StorageError, Transformation, UploadedImage};

const BASE_URL: &str = "https://images.test";

#[derive(Default)]
pub struct MemoryStorage {
    assets: RwLock<HashMap<String, Bytes>>,
    version: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, public_id: &str) -> Option<Bytes> {
        self.assets.read().await.get(public_id).cloned()
    }

    pub async fn contains(&self, public_id: &str) -> bool {
        self.assets.read().await.contains_key(public_id)
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ImageStorage for MemoryStorage {
    async fn upload(
        &self,
        data: Bytes,
        public_id: &str,
        overwrite: bool,
    ) -> Result<UploadedImage, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyUpload);
        }

        let mut assets = self.assets.write().await;
        if !overwrite && assets.contains_key(public_id) {
            return Err(StorageError::Api {
                status: 409,
                message: format!("{} already exists", public_id),
            });
        }
        assets.insert(public_id.to_string(), data);

        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadedImage {
            public_id: public_id.to_string(),
            version,
            secure_url: self.url_for(public_id, Some(version), &[]),
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StorageError> {
        self.assets.write().await.remove(public_id);
        Ok(())
    }

    fn url_for(
        &self,
        public_id: &str,
        version: Option<u64>,
        transformations: &[Transformation],
    ) -> String {
        let mut parts = vec![BASE_URL.to_string()];

        let chain = chain_to_path(transformations);
        if !chain.is_empty() {
            parts.push(chain);
        }
        if let Some(version) = version {
            parts.push(format!("v{}", version));
        }
        parts.push(public_id.to_string());

        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_destroy() {
        let storage = MemoryStorage::new();

        let uploaded = storage
            .upload(Bytes::from_static(b"png"), "photo_share/a", false)
            .await
            .unwrap();
        assert_eq!(uploaded.version, 1);
        assert_eq!(uploaded.secure_url, "https://images.test/v1/photo_share/a");
        assert!(storage.contains("photo_share/a").await);

        let duplicate = storage
            .upload(Bytes::from_static(b"png"), "photo_share/a", false)
            .await;
        assert!(duplicate.is_err());

        storage.destroy("photo_share/a").await.unwrap();
        assert!(storage.is_empty().await);

        // missing assets are fine
        storage.destroy("photo_share/a").await.unwrap();
    }

    #[test]
    fn test_url_with_transformations() {
        let storage = MemoryStorage::new();
        let chain = vec![Transformation::new().effect("cartoonify")];

        assert_eq!(
            storage.url_for("photo_share/a", None, &chain),
            "https://images.test/e_cartoonify/photo_share/a"
        );
    }
}
