//! Keypoint-driven garment view synthesis and presigned multi-asset upload.

pub mod config;
pub mod error;
pub mod pose;
pub mod record;
pub mod upload;
pub mod views;

pub use error::{ApiError, UploadError, ViewError, ViewWarning};
pub use pose::{Keypoint, KeypointSet, PartName};
pub use record::{BatchRecord, ImageRecord};
pub use upload::{upload_batch, upload_views, ImageSource, StorageApi, UploadOptions};
pub use views::{synthesize, BoundingBox, SynthesisOptions, ViewName, ViewSet};
