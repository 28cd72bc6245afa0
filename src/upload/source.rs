//! Upload inputs: encoded view blobs and batch entries.

use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use image::ImageFormat;
use url::Url;

use crate::error::UploadError;
use crate::views::{encode_png, ViewSet};

/// Extensions accepted on direct image URLs.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// One blob to push through a presigned slot.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadDescriptor {
    pub name: String,
    pub blob: Bytes,
    pub content_type: String,
}

/// An already-hosted image URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectUrl(String);

impl DirectUrl {
    /// Accepts an absolute URL whose text ends in a known image extension.
    ///
    /// The extension check runs on the input as typed, so a trailing query
    /// string or fragment makes the URL invalid.
    pub fn parse(input: &str) -> Result<Self, UploadError> {
        let trimmed = input.trim();
        if Url::parse(trimmed).is_err() || !has_image_extension(trimmed) {
            return Err(UploadError::InvalidUrl(input.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn has_image_extension(text: &str) -> bool {
    let Some((_, ext)) = text.rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
}

/// True when `input` would be accepted as a direct batch URL.
pub fn is_valid_image_url(input: &str) -> bool {
    DirectUrl::parse(input).is_ok()
}

/// A batch entry: raw bytes to upload, or a URL used as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(UploadDescriptor),
    Url(DirectUrl),
}

impl ImageSource {
    pub fn file(name: impl Into<String>, bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        ImageSource::File(UploadDescriptor {
            name: name.into(),
            blob: bytes.into(),
            content_type: content_type.into(),
        })
    }

    pub fn url(input: &str) -> Result<Self, UploadError> {
        DirectUrl::parse(input).map(ImageSource::Url)
    }

    /// Reads a local file, taking the content type from its extension.
    ///
    /// Only `image/*` types are accepted; anything else fails with
    /// [`UploadError::UnsupportedFile`] before the file is read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let content_type = content_type_for_path(path);
        if !content_type.starts_with("image/") {
            return Err(UploadError::UnsupportedFile { name, content_type }.into());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::file(name, bytes, content_type))
    }
}

/// MIME type guessed from a file extension.
pub fn content_type_for_path(path: &Path) -> String {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
    {
        return "image/svg+xml".to_string();
    }
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Encodes every view as `<view>.png`.
pub fn describe_views(views: &ViewSet) -> Result<Vec<UploadDescriptor>, UploadError> {
    views
        .iter()
        .map(|(name, image)| {
            let file_name = name.file_name();
            let png = encode_png(image).map_err(|e| UploadError::Encode {
                name: file_name.clone(),
                reason: e.to_string(),
            })?;
            Ok(UploadDescriptor {
                name: file_name,
                blob: Bytes::from(png),
                content_type: "image/png".to_string(),
            })
        })
        .collect()
}
