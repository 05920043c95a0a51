//! Session state machine.
//!
//! One [`SessionState`] exists per editing session. It is only ever changed
//! by [`update`], which takes a [`Message`] describing something that happened
//! (a user action or a finished task) and may hand back a [`Command`] for the
//! runtime to execute. Finished tasks come back as messages tagged with the
//! generation they were started under; anything tagged with an older
//! generation is dropped.
//!
//! ```text
//! Idle ──select──▶ Uploading ──encoded──▶ Idle(asset) ──process──▶ Processing
//!                      │                                             │    │
//!                      └──read failed──▶ Error ◀──────edit failed────┘    │
//!                                                                         ▼
//!                                              Processing ◀──process── Success
//! ```
//!
//! `Reset` returns to `Idle` from anywhere.

use crate::error::{Result, ValidationError};
use crate::image::{self, EditRequest, EditResult, ImageAsset, ImageSource};

/// Instruction the prompt editor starts with.
pub const DEFAULT_INSTRUCTION: &str = "Remove all artificial visual effects, filters, lens flares, and overlays. Make the photo look natural, realistic, and high quality. Keep original subjects intact.";

/// Shown when a selected file cannot be read.
pub const READ_FAILED_MESSAGE: &str = "Failed to read the image file. Please try again.";

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    /// Waiting for input. May or may not hold an image.
    #[default]
    Idle,
    /// A selected file is being read and encoded.
    Uploading,
    /// An edit request is in flight.
    Processing,
    /// The last edit produced a result.
    Success,
    /// The last encode or edit failed.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Uploading => write!(f, "uploading"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// State of one editing session.
#[derive(Debug)]
pub struct SessionState {
    status: Status,
    asset: Option<ImageAsset>,
    result: Option<EditResult>,
    error: Option<String>,
    instruction: String,
    generation: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            asset: None,
            result: None,
            error: None,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            generation: 0,
        }
    }
}

impl SessionState {
    /// Creates a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The selected image, if encoding has finished.
    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }

    /// The edit result. Only present in [`Status::Success`].
    pub fn result(&self) -> Option<&EditResult> {
        match self.status {
            Status::Success => self.result.as_ref(),
            _ => None,
        }
    }

    /// The result to show on screen. While regenerating this is the
    /// previous result, kept until a new one replaces it.
    pub fn displayed_result(&self) -> Option<&EditResult> {
        match self.status {
            Status::Success | Status::Processing => self.result.as_ref(),
            _ => None,
        }
    }

    /// The error message. Only present in [`Status::Error`].
    pub fn error(&self) -> Option<&str> {
        match self.status {
            Status::Error => self.error.as_deref(),
            _ => None,
        }
    }

    /// Current instruction text.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Generation token for tasks started now.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an edit can be started.
    pub fn can_process(&self) -> bool {
        self.asset.is_some()
            && matches!(self.status, Status::Idle | Status::Success | Status::Error)
    }

    /// Whether a new file can be selected.
    pub fn can_select(&self) -> bool {
        self.status != Status::Processing
    }

    /// Whether the instruction text is editable.
    pub fn can_edit_instruction(&self) -> bool {
        self.status != Status::Processing
    }

    fn clear(&mut self) {
        self.asset = None;
        self.result = None;
        self.error = None;
    }
}

/// Something that happened to the session.
#[derive(Debug)]
pub enum Message {
    /// The user picked a file.
    FileSelected(ImageSource),
    /// An encode task finished.
    EncodeFinished {
        /// Generation the encode was started under.
        generation: u64,
        /// The encoded asset, or why reading failed.
        result: Result<ImageAsset>,
    },
    /// The user edited the instruction.
    InstructionChanged(String),
    /// The user asked to run (or re-run) the edit.
    ProcessRequested,
    /// An edit task finished.
    EditFinished {
        /// Generation the edit was started under.
        generation: u64,
        /// The edited image, or the remote failure.
        result: Result<EditResult>,
    },
    /// The user asked to start over.
    Reset,
}

/// Work the runtime should start on behalf of the session.
#[derive(Debug)]
pub enum Command {
    /// Read and encode a selection.
    Encode {
        /// Current generation, echoed back on completion.
        generation: u64,
        /// The validated selection.
        source: ImageSource,
    },
    /// Send an edit request.
    Edit {
        /// Current generation, echoed back on completion.
        generation: u64,
        /// Image and instruction to send.
        request: EditRequest,
    },
}

/// What an [`update`] did.
#[derive(Debug)]
#[must_use]
pub enum UpdateOutcome {
    /// Nothing changed (guarded action or stale completion).
    Unchanged,
    /// The state changed.
    Changed,
    /// The state changed and a command must be run.
    Run(Command),
    /// The selection failed pre-flight checks. Nothing changed.
    Rejected(ValidationError),
}

impl UpdateOutcome {
    /// Whether the state changed.
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed | Self::Run(_))
    }
}

/// Applies `message` to `state`.
pub fn update(state: &mut SessionState, message: Message) -> UpdateOutcome {
    match message {
        Message::FileSelected(source) => select_file(state, source),
        Message::EncodeFinished { generation, result } => {
            if generation != state.generation || state.status != Status::Uploading {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    "discarding stale encode result"
                );
                return UpdateOutcome::Unchanged;
            }
            match result {
                Ok(asset) => {
                    state.asset = Some(asset);
                    state.status = Status::Idle;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "error reading file");
                    state.error = Some(READ_FAILED_MESSAGE.to_string());
                    state.status = Status::Error;
                }
            }
            UpdateOutcome::Changed
        }
        Message::InstructionChanged(text) => {
            if !state.can_edit_instruction() || text == state.instruction {
                return UpdateOutcome::Unchanged;
            }
            state.instruction = text;
            UpdateOutcome::Changed
        }
        Message::ProcessRequested => {
            if !state.can_process() {
                return UpdateOutcome::Unchanged;
            }
            let Some(asset) = state.asset.as_ref() else {
                return UpdateOutcome::Unchanged;
            };
            let request = asset.edit_request(state.instruction.clone());
            state.error = None;
            state.status = Status::Processing;
            UpdateOutcome::Run(Command::Edit {
                generation: state.generation,
                request,
            })
        }
        Message::EditFinished { generation, result } => {
            if generation != state.generation || state.status != Status::Processing {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    "discarding stale edit result"
                );
                return UpdateOutcome::Unchanged;
            }
            match result {
                Ok(result) => {
                    state.result = Some(result);
                    state.status = Status::Success;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "processing failed");
                    state.result = None;
                    state.error = Some(e.user_message().to_string());
                    state.status = Status::Error;
                }
            }
            UpdateOutcome::Changed
        }
        Message::Reset => {
            state.clear();
            state.instruction = DEFAULT_INSTRUCTION.to_string();
            state.status = Status::Idle;
            state.generation += 1;
            UpdateOutcome::Changed
        }
    }
}

fn select_file(state: &mut SessionState, source: ImageSource) -> UpdateOutcome {
    if !state.can_select() {
        return UpdateOutcome::Unchanged;
    }
    if let Err(e) = image::validate(&source) {
        tracing::debug!(name = %source.name, error = %e, "rejected selection");
        return UpdateOutcome::Rejected(e);
    }

    state.generation += 1;
    state.clear();
    state.status = Status::Uploading;
    UpdateOutcome::Run(Command::Encode {
        generation: state.generation,
        source,
    })
}
