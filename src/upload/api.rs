//! Client for the presigned-URL, persistence and listing endpoints.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::record::{BatchRecord, ImageRecord, StoredBatch, StoredImage};

/// One entry of the presigned-URL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSpec {
    pub file_name: String,
    pub file_type: String,
}

#[derive(Debug, Serialize)]
struct PresignRequest<'a> {
    files: &'a [FileSpec],
}

#[derive(Debug, Deserialize)]
struct PresignResponse {
    urls: Vec<PresignedSlot>,
}

/// Upload target issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedSlot {
    #[serde(rename = "presignedUrl")]
    pub upload_url: String,
    #[serde(rename = "imageUrl")]
    pub public_url: String,
    /// Echo of the requested file name, when the backend sends it.
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// The two-phase storage protocol plus record persistence.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Asks for one presigned slot per file.
    async fn request_slots(&self, files: &[FileSpec]) -> Result<Vec<PresignedSlot>, ApiError>;

    /// Uploads one blob to its slot.
    async fn put_object(
        &self,
        slot: &PresignedSlot,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ApiError>;

    async fn persist_image(&self, record: &ImageRecord) -> Result<(), ApiError>;

    async fn persist_batch(&self, record: &BatchRecord) -> Result<(), ApiError>;
}

/// reqwest-backed [`StorageApi`].
#[derive(Clone)]
pub struct HttpStorageApi {
    client: Client,
    base_url: Url,
    config: ApiConfig,
}

impl HttpStorageApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Endpoint(format!("{}: {e}", config.base_url)))?;
        // PUT legs are bounded by the upload saga's own timeout.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|e| ApiError::Endpoint(format!("{path}: {e}")))
    }

    /// `GET /upload/images`
    pub async fn list_images(&self) -> Result<Vec<StoredImage>, ApiError> {
        let url = self.endpoint(&self.config.images_list_path)?;
        let req = self.client.get(url).timeout(self.request_timeout());
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// `GET /upload/batches`
    pub async fn list_batches(&self) -> Result<Vec<StoredBatch>, ApiError> {
        let url = self.endpoint(&self.config.batches_list_path)?;
        let req = self.client.get(url).timeout(self.request_timeout());
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Downloads a source image for single-image mode.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes, ApiError> {
        let req = self.client.get(url).timeout(self.request_timeout());
        let resp = check_status(req.send().await?).await?;
        Ok(resp.bytes().await?)
    }
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl StorageApi for HttpStorageApi {
    async fn request_slots(&self, files: &[FileSpec]) -> Result<Vec<PresignedSlot>, ApiError> {
        let url = self.endpoint(&self.config.presign_path)?;
        let resp = self
            .client
            .post(url)
            .timeout(self.request_timeout())
            .json(&PresignRequest { files })
            .send()
            .await?;
        let parsed: PresignResponse = check_status(resp).await?.json().await?;
        Ok(parsed.urls)
    }

    async fn put_object(
        &self,
        slot: &PresignedSlot,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ApiError> {
        let resp = self
            .client
            .put(&slot.upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn persist_image(&self, record: &ImageRecord) -> Result<(), ApiError> {
        let url = self.endpoint(&self.config.image_path)?;
        let resp = self
            .client
            .post(url)
            .timeout(self.request_timeout())
            .json(record)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn persist_batch(&self, record: &BatchRecord) -> Result<(), ApiError> {
        let url = self.endpoint(&self.config.batch_path)?;
        let resp = self
            .client
            .post(url)
            .timeout(self.request_timeout())
            .json(record)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}
