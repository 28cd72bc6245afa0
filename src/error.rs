//! Error taxonomy for view synthesis and upload.
//!
//! Synthesis failures ([`ViewError`]) never touch the network. Upload failures
//! ([`UploadError`]) say how far the protocol got, so a caller can tell
//! "nothing uploaded" apart from "uploaded but unrecorded".

use thiserror::Error;

use crate::pose::PartName;
use crate::record::PersistPayload;
use crate::views::ViewName;

/// 必須ビューの生成失敗
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    #[error("missing keypoints for {view} view: {}", format_parts(.missing))]
    MissingKeypoints { view: ViewName, missing: Vec<PartName> },

    #[error("source image has zero area ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
}

/// 任意ビューのスキップ（処理は継続）
#[derive(Debug, Clone, PartialEq)]
pub enum ViewWarning {
    SkippedView { view: ViewName, missing: Vec<PartName> },
}

impl std::fmt::Display for ViewWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewWarning::SkippedView { view, missing } => write!(
                f,
                "skipping {} view, missing keypoints: {}",
                view,
                format_parts(missing)
            ),
        }
    }
}

fn format_parts(parts: &[PartName]) -> String {
    parts
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Transport-level failure talking to the storage or persistence API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// One PUT leg that did not complete.
#[derive(Debug)]
pub struct TransferFailure {
    pub name: String,
    pub error: ApiError,
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

fn summarize_transfer(failed: &[TransferFailure], committed: &[String]) -> String {
    let legs = failed
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "{} of {} transfers failed: {}",
        failed.len(),
        failed.len() + committed.len(),
        legs
    )
}

/// Errors raised by the upload orchestrator.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Direct URL rejected at input time.
    #[error("invalid image URL: {0}")]
    InvalidUrl(String),

    /// Local batch file whose extension is not an image type.
    #[error("not an image file: {name} ({content_type})")]
    UnsupportedFile { name: String, content_type: String },

    #[error("no images to upload")]
    NoImages,

    /// Presigned slots could not be obtained; nothing was uploaded.
    #[error("failed to request presigned URLs: {0}")]
    SlotRequest(#[source] ApiError),

    /// The slot response does not line up with the files we asked for.
    #[error("presigned URL response does not match request: {0}")]
    SlotMismatch(String),

    #[error("failed to encode {name}: {reason}")]
    Encode { name: String, reason: String },

    /// At least one PUT failed after all retries; `committed` legs are now
    /// stored but unreferenced.
    #[error("{}", summarize_transfer(.failed, .committed))]
    Transfer {
        failed: Vec<TransferFailure>,
        committed: Vec<String>,
    },

    /// Every asset is stored but the metadata call failed. `payload` can be
    /// re-sent on its own.
    #[error("assets uploaded but not recorded: {source}")]
    Persist {
        payload: PersistPayload,
        #[source]
        source: ApiError,
    },

    #[error("no full view URL to use as the primary image")]
    MissingPrimary,

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    /// True when assets reached storage but no record points at them.
    pub fn is_uploaded_unrecorded(&self) -> bool {
        matches!(self, UploadError::Persist { .. })
    }

    /// True when the failure happened before any byte could have been stored.
    pub fn is_nothing_uploaded(&self) -> bool {
        match self {
            UploadError::InvalidUrl(_)
            | UploadError::UnsupportedFile { .. }
            | UploadError::NoImages
            | UploadError::SlotRequest(_)
            | UploadError::SlotMismatch(_)
            | UploadError::Encode { .. }
            | UploadError::MissingPrimary => true,
            UploadError::Transfer { committed, .. } => committed.is_empty(),
            UploadError::Persist { .. } | UploadError::Cancelled => false,
        }
    }
}
