//! Persistence payloads and the read-back records returned by the listing
//! endpoints.
//!
//! Assembly is pure: the orchestrator hands over URLs and gets back the exact
//! body the backend expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::views::ViewName;

/// Body of `POST /upload/image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// URL of the `full` view.
    pub image_url: String,
    pub views: BTreeMap<ViewName, String>,
}

/// Body of `POST /upload/batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub image_urls: Vec<String>,
}

/// Whatever was about to be persisted when the metadata call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PersistPayload {
    Image(ImageRecord),
    Batch(BatchRecord),
}

/// Builds the single-image record from uploaded view URLs.
pub fn assemble_image_record<I>(uploaded: I) -> Result<ImageRecord, UploadError>
where
    I: IntoIterator<Item = (ViewName, String)>,
{
    let views: BTreeMap<ViewName, String> = uploaded.into_iter().collect();
    let image_url = views
        .get(&ViewName::Full)
        .cloned()
        .ok_or(UploadError::MissingPrimary)?;
    Ok(ImageRecord { image_url, views })
}

/// Direct URLs first, then freshly uploaded ones.
pub fn assemble_batch_record(direct: Vec<String>, uploaded: Vec<String>) -> BatchRecord {
    let mut image_urls = direct;
    image_urls.extend(uploaded);
    BatchRecord { image_urls }
}

/// Server-owned processing state. Read for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One entry of `GET /upload/images` (also nested in batches).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    #[serde(rename = "_id")]
    pub id: String,
    pub image_url: String,
    pub status: ProcessingStatus,
    /// View name -> URL as the server stored it; keys are not checked
    /// against [`ViewName`].
    #[serde(default)]
    pub views: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One entry of `GET /upload/batches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBatch {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<ProcessingStatus>,
    #[serde(default)]
    pub total_images: u32,
    #[serde(default)]
    pub processed_images: u32,
    #[serde(default)]
    pub images: Vec<StoredImage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredBatch {
    /// Fraction of images the server reports as processed.
    pub fn progress(&self) -> f32 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.processed_images as f32 / self.total_images as f32
    }
}
