pub mod api;
pub mod orchestrator;
pub mod source;

pub use api::{FileSpec, HttpStorageApi, PresignedSlot, StorageApi};
pub use orchestrator::{
    match_slots, upload_batch, upload_views, SagaState, StateObserver, UploadOptions, UploadSaga,
};
pub use source::{
    content_type_for_path, describe_views, is_valid_image_url, DirectUrl, ImageSource,
    UploadDescriptor,
};
