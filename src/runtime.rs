//! Executes session commands as cooperative async tasks.

use crate::error::ValidationError;
use crate::image::{Encoder, ImageEditor};
use crate::session::{self, Command, Message, SessionState, UpdateOutcome};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Owns a session and runs the work its transitions ask for.
///
/// Every state change goes through [`session::update`]. Commands are spawned
/// onto a [`JoinSet`]; their completions are fed back as messages by
/// [`Runtime::next_completion`].
pub struct Runtime {
    state: SessionState,
    encoder: Encoder,
    editor: Arc<dyn ImageEditor>,
    tasks: JoinSet<Message>,
}

impl Runtime {
    /// Creates a runtime with a fresh session.
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self::with_encoder(editor, Encoder::new())
    }

    /// Creates a runtime that encodes with `encoder`.
    pub fn with_encoder(editor: Arc<dyn ImageEditor>, encoder: Encoder) -> Self {
        Self {
            state: SessionState::new(),
            encoder,
            editor,
            tasks: JoinSet::new(),
        }
    }

    /// Current session snapshot.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The encoder used for selections.
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// The editor used for edit requests.
    pub fn editor(&self) -> &dyn ImageEditor {
        self.editor.as_ref()
    }

    /// Whether any task is still in flight.
    pub fn is_busy(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Applies a message. Returns whether the state changed, or the
    /// validation error if a selection was rejected.
    pub fn dispatch(&mut self, message: Message) -> Result<bool, ValidationError> {
        match session::update(&mut self.state, message) {
            UpdateOutcome::Unchanged => Ok(false),
            UpdateOutcome::Changed => Ok(true),
            UpdateOutcome::Run(command) => {
                self.spawn(command);
                Ok(true)
            }
            UpdateOutcome::Rejected(e) => Err(e),
        }
    }

    fn spawn(&mut self, command: Command) {
        match command {
            Command::Encode { generation, source } => {
                let encoder = self.encoder.clone();
                self.tasks.spawn(async move {
                    let result = encoder.encode(source).await;
                    Message::EncodeFinished { generation, result }
                });
            }
            Command::Edit {
                generation,
                request,
            } => {
                let editor = Arc::clone(&self.editor);
                self.tasks.spawn(async move {
                    let result = editor.edit(&request).await;
                    Message::EditFinished { generation, result }
                });
            }
        }
    }

    /// Waits for the next task to finish and applies its message.
    ///
    /// Returns `None` when nothing is in flight, otherwise whether the
    /// completion changed the state (stale completions do not).
    pub async fn next_completion(&mut self) -> Option<bool> {
        loop {
            match self.tasks.join_next().await? {
                Ok(message) => {
                    // Completions never carry a selection, so they cannot be rejected.
                    return Some(self.dispatch(message).unwrap_or(false));
                }
                Err(e) => {
                    tracing::error!(error = %e, "session task did not complete");
                }
            }
        }
    }

    /// Runs until no task is in flight.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }
}
