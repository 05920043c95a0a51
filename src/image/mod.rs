//! Image encoding and editing.

pub mod encoder;
pub mod preview;
mod provider;
pub mod providers;
mod types;

pub use encoder::{validate, Encoder, MAX_IMAGE_BYTES};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use provider::{EditorKind, ImageEditor};
pub use types::{
    EditRequest, EditResult, ImageAsset, ImageFormat, ImageSource, SourceOrigin,
    RESULT_MIME_TYPE, UNKNOWN_MIME_TYPE,
};
