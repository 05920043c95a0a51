//! Image editor trait.

use crate::error::Result;
use crate::image::types::{EditRequest, EditResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Image editor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    /// Google Gemini image models.
    Gemini,
    /// In-process editor (tests, offline demos).
    Local,
}

impl std::fmt::Display for EditorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A remote capability that edits an image according to an instruction.
///
/// Implementations make exactly one attempt per call and never touch
/// session state.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Edits the image in `request` and returns the result as a PNG data URI.
    async fn edit(&self, request: &EditRequest) -> Result<EditResult>;

    /// Returns the kind of this editor.
    fn kind(&self) -> EditorKind;

    /// Returns the name of this editor for display.
    fn name(&self) -> &str {
        match self.kind() {
            EditorKind::Gemini => "Gemini (Google)",
            EditorKind::Local => "Local",
        }
    }

    /// Checks if the editor is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
