#![warn(missing_docs)]
//! ClearView - remove filters, overlays and other artificial effects from
//! photos using generative image editing.
//!
//! The crate is split into:
//!
//! - [`image`]: reading and base64-encoding a selected file, and the
//!   [`ImageEditor`] trait with its Gemini implementation.
//! - [`session`]: the session state machine, driven by [`session::update`].
//! - [`runtime`]: runs the encode/edit work a transition asks for and feeds
//!   the completions back into the session.
//! - [`ui`] and [`download`]: text rendering, input parsing and saving results.
//!
//! # Quick Start
//!
//! ```no_run
//! use clearview::{GeminiEditor, ImageSource, Message, Runtime, Status};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> clearview::Result<()> {
//!     let editor = GeminiEditor::builder().build()?;
//!     let mut runtime = Runtime::new(Arc::new(editor));
//!
//!     let source = ImageSource::from_path("photo.jpg").await?;
//!     runtime.dispatch(Message::FileSelected(source))?;
//!     runtime.settle().await;
//!
//!     runtime.dispatch(Message::ProcessRequested)?;
//!     runtime.settle().await;
//!
//!     if runtime.state().status() == Status::Success {
//!         clearview::download::download(runtime.state(), None).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini` (default): Gemini image editing provider
//! - `cli` (default): the `clearview` command-line front end

pub mod download;
mod error;
pub mod image;
pub mod runtime;
pub mod session;
pub mod ui;

// Re-export error types at crate root
pub use error::{classify_message, ClearViewError, FailureKind, Result, ValidationError};

pub use image::{
    EditRequest, EditResult, EditorKind, Encoder, ImageAsset, ImageEditor, ImageFormat,
    ImageSource, PreviewHandle, PreviewRegistry,
};

#[cfg(feature = "gemini")]
pub use image::providers::{GeminiEditor, GeminiEditorBuilder, GeminiModel};

pub use runtime::Runtime;
pub use session::{
    update, Command, Message, SessionState, Status, UpdateOutcome, DEFAULT_INSTRUCTION,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ClearViewError, Result};
    pub use crate::image::{EditRequest, EditResult, ImageEditor, ImageSource};
    pub use crate::runtime::Runtime;
    pub use crate::session::{Message, SessionState, Status};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiEditor;
}
