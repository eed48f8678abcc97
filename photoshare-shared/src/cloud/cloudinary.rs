/// Cloudinary-backed image storage
///
/// Uploads and deletions are signed REST calls:
///
/// ```text
/// signature = sha256("k1=v1&k2=v2...{api_secret}")
/// ```
///
/// where the signed parameters are sorted by name and exclude `file`,
/// `api_key` and `signature_algorithm`. Delivery URLs are unsigned:
///
/// ```text
/// https://res.cloudinary.com/{cloud}/image/upload/{t1}/{t2}/v{version}/{public_id}
/// ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::transform::chain_to_path;
use super::{ImageStorage, StorageError, Transformation, UploadedImage};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Cloudinary account credentials
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Request timeout in seconds. Default: 30
    pub timeout_secs: u64,
}

impl CloudinaryConfig {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            cloud_name,
            api_key,
            api_secret,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    version: u64,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct CloudinaryStorage {
    config: CloudinaryConfig,
    http: reqwest::Client,
}

impl CloudinaryStorage {
    pub fn new(config: CloudinaryConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_BASE, self.config.cloud_name, action)
    }

    /// Signs `params` and returns them with `api_key` and `signature` added
    fn signed(&self, params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        let signature = sign_params(&params, &self.config.api_secret);

        let mut signed = params;
        signed.insert("api_key", self.config.api_key.clone());
        signed.insert("signature", signature);
        signed.insert("signature_algorithm", "sha256".to_string());
        signed
    }

    async fn error_from(response: reqwest::Response) -> StorageError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => "unknown error".to_string(),
        };
        StorageError::Api { status, message }
    }
}

/// Computes the request signature over the sorted parameters
pub fn sign_params(params: &BTreeMap<&'static str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{}{}", to_sign, api_secret).as_bytes());
    hex::encode(digest)
}

#[async_trait]
impl ImageStorage for CloudinaryStorage {
    async fn upload(
        &self,
        data: Bytes,
        public_id: &str,
        overwrite: bool,
    ) -> Result<UploadedImage, StorageError> {
        if data.is_empty() {
            return Err(StorageError::EmptyUpload);
        }

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("overwrite", overwrite.to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in self.signed(params) {
            form = form.text(key, value);
        }
        let file = reqwest::multipart::Part::bytes(data.to_vec()).file_name("upload");
        form = form.part("file", file);

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        tracing::debug!(public_id = %body.public_id, version = body.version, "Image uploaded");

        Ok(UploadedImage {
            public_id: body.public_id,
            version: body.version,
            secure_url: body.secure_url,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StorageError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&self.signed(params))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                tracing::warn!(public_id, "Asset to destroy was not found");
                Ok(())
            }
            other => Err(StorageError::InvalidResponse(format!(
                "destroy returned '{}'",
                other
            ))),
        }
    }

    fn url_for(
        &self,
        public_id: &str,
        version: Option<u64>,
        transformations: &[Transformation],
    ) -> String {
        let mut url = format!("{}/{}/image/upload", DELIVERY_BASE, self.config.cloud_name);

        let chain = chain_to_path(transformations);
        if !chain.is_empty() {
            url.push('/');
            url.push_str(&chain);
        }
        if let Some(version) = version {
            url.push_str(&format!("/v{}", version));
        }

        url.push('/');
        url.push_str(public_id);
        url
    }
}
