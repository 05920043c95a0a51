//! Core types for image editing.

use crate::error::{ClearViewError, Result};
use crate::image::preview::PreviewHandle;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// MIME type reported for files whose extension we do not recognise.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// MIME type of every edit result. The remote model normalises its output.
pub const RESULT_MIME_TYPE: &str = "image/png";

/// Image formats recognised from file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
    /// BMP format.
    Bmp,
    /// TIFF format.
    Tiff,
    /// HEIC/HEIF format.
    Heic,
    /// AVIF format.
    Avif,
    /// SVG vector image.
    Svg,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Heic => "image/heic",
            Self::Avif => "image/avif",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "heic" | "heif" => Some(Self::Heic),
            "avif" => Some(Self::Avif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Guesses the MIME type of a path from its extension.
    pub fn mime_type_for_path(path: &Path) -> &'static str {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .map(|f| f.mime_type())
            .unwrap_or(UNKNOWN_MIME_TYPE)
    }
}

/// Where the bytes of a selection come from.
#[derive(Debug, Clone)]
pub enum SourceOrigin {
    /// A file on disk, read lazily by the encoder.
    Path(PathBuf),
    /// Bytes already held in memory.
    Bytes(Vec<u8>),
}

/// A user's file selection before it has been encoded.
#[derive(Debug, Clone)]
pub struct ImageSource {
    /// Display name (usually the file name).
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Where the bytes live.
    pub origin: SourceOrigin,
}

impl ImageSource {
    /// Describes a file on disk. Reads metadata only, not contents.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| ClearViewError::Read {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            mime_type: ImageFormat::mime_type_for_path(path).to_string(),
            size: metadata.len(),
            origin: SourceOrigin::Path(path.to_path_buf()),
        })
    }

    /// Wraps bytes that are already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            origin: SourceOrigin::Bytes(data),
        }
    }
}

/// An encoded image owned by the session.
///
/// Immutable once created. Dropping it releases its preview handle.
#[derive(Debug)]
pub struct ImageAsset {
    name: String,
    mime_type: String,
    data: Vec<u8>,
    base64_data: String,
    preview: PreviewHandle,
}

impl ImageAsset {
    pub(crate) fn new(
        name: String,
        mime_type: String,
        data: Vec<u8>,
        base64_data: String,
        preview: PreviewHandle,
    ) -> Self {
        Self {
            name,
            mime_type,
            data,
            base64_data,
            preview,
        }
    }

    /// Display name of the original file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type of the original file.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw bytes of the original file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Base64 payload, without any `data:` prefix.
    pub fn base64_data(&self) -> &str {
        &self.base64_data
    }

    /// Local preview reference.
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    /// Size of the original file in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Builds the request that edits this image with `instruction`.
    pub fn edit_request(&self, instruction: impl Into<String>) -> EditRequest {
        EditRequest::new(self.base64_data.clone(), self.mime_type.clone(), instruction)
    }
}

/// A single edit call. Built per invocation and not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// Base64 image payload.
    pub image_base64: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Natural-language instruction.
    pub instruction: String,
}

impl EditRequest {
    /// Creates a new edit request.
    pub fn new(
        image_base64: impl Into<String>,
        mime_type: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            image_base64: image_base64.into(),
            mime_type: mime_type.into(),
            instruction: instruction.into(),
        }
    }
}

/// An edited image, held as a PNG data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "edit result should be displayed or saved"]
pub struct EditResult {
    data_uri: String,
}

impl EditResult {
    /// Wraps a base64 payload returned by the remote model.
    pub fn from_base64(payload: &str) -> Self {
        Self {
            data_uri: format!("data:{RESULT_MIME_TYPE};base64,{payload}"),
        }
    }

    /// Returns the data URI.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Returns the base64 payload after the `base64,` marker.
    pub fn base64_payload(&self) -> &str {
        self.data_uri
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    /// Decodes the payload into raw image bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.base64_payload())
            .map_err(|e| ClearViewError::Decode(e.to_string()))
    }

    /// Decodes and writes the image to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<usize> {
        let bytes = self.to_bytes()?;
        tokio::fs::write(path, &bytes).await?;
        Ok(bytes.len())
    }
}

impl std::fmt::Display for EditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data_uri)
    }
}
