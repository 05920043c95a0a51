//! Turns a file selection into a base64-encoded [`ImageAsset`].

use crate::error::{ClearViewError, Result, ValidationError};
use crate::image::preview::PreviewRegistry;
use crate::image::types::{ImageAsset, ImageSource, SourceOrigin};
use base64::Engine;

/// Largest file accepted for editing (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Checks a selection before anything is read or sent.
pub fn validate(source: &ImageSource) -> std::result::Result<(), ValidationError> {
    if !source.mime_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            mime_type: source.mime_type.clone(),
        });
    }
    if source.size > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge {
            size: source.size,
            limit: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

/// Reads and encodes selections, issuing preview handles from a shared registry.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    previews: PreviewRegistry,
}

impl Encoder {
    /// Creates an encoder with its own preview registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry this encoder issues preview handles from.
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Reads the selection and encodes it.
    pub async fn encode(&self, source: ImageSource) -> Result<ImageAsset> {
        let ImageSource {
            name,
            mime_type,
            origin,
            ..
        } = source;

        let data = match origin {
            SourceOrigin::Bytes(data) => data,
            SourceOrigin::Path(path) => {
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| ClearViewError::Read {
                        name: name.clone(),
                        source,
                    })?
            }
        };

        let base64_data = base64::engine::general_purpose::STANDARD.encode(&data);
        tracing::debug!(
            name = %name,
            mime_type = %mime_type,
            bytes = data.len(),
            "encoded image"
        );

        let preview = self.previews.acquire(&name);
        Ok(ImageAsset::new(name, mime_type, data, base64_data, preview))
    }
}
