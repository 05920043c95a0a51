//! Error types for image editing.

use std::time::Duration;

/// Maximum length of an upstream error message kept in an error value.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while encoding or editing an image.
#[derive(Debug, thiserror::Error)]
pub enum ClearViewError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Upstream message, sanitized.
        message: String,
    },

    /// Rate limit or quota exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Delay from the `Retry-After` header, if sent.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// The selected image could not be read.
    #[error("failed to read {name}: {source}")]
    Read {
        /// Display name of the selection.
        name: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// I/O error (e.g., saving a result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with a shape we did not expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The API succeeded but returned no image part.
    #[error("no image data found in the response")]
    NoImageInResponse,

    /// The selected file failed pre-flight checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Pre-flight rejection of a selected file. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The MIME type does not start with `image/`.
    #[error("Please upload an image file.")]
    NotAnImage {
        /// Declared MIME type of the selection.
        mime_type: String,
    },

    /// The file exceeds the size limit.
    #[error("File is too large. Please try an image under 10MB.")]
    TooLarge {
        /// Size of the selection in bytes.
        size: u64,
        /// Largest accepted size in bytes.
        limit: u64,
    },
}

/// Coarse classification of an edit failure, used to pick the message
/// shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote rejected the input (HTTP 400 class).
    UnsupportedInput,
    /// The credential is missing or rejected.
    Configuration,
    /// Anything else.
    Generic,
}

impl FailureKind {
    /// Returns the user-facing message for this kind of failure.
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnsupportedInput => {
                "The image might be too complex or the format is unsupported by the current model."
            }
            Self::Configuration => "API Configuration Error. Please check your key.",
            Self::Generic => "An error occurred while processing the image.",
        }
    }
}

impl ClearViewError {
    /// Classifies this error for display.
    ///
    /// Structured variants are matched first; the rendered error text is
    /// only searched when the variant itself carries no usable signal.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Api { status: 400, .. } | Self::InvalidRequest(_) => {
                FailureKind::UnsupportedInput
            }
            Self::Auth(_) => FailureKind::Configuration,
            Self::NoImageInResponse | Self::ContentBlocked(_) | Self::RateLimited { .. } => {
                FailureKind::Generic
            }
            other => classify_message(&other.to_string()),
        }
    }

    /// Returns the message shown to the user for this error.
    pub fn user_message(&self) -> &'static str {
        self.failure_kind().message()
    }
}

/// Substring heuristics for error text that carries no structured code.
pub fn classify_message(text: &str) -> FailureKind {
    if text.contains("400") {
        FailureKind::UnsupportedInput
    } else if text.contains("API_KEY") {
        FailureKind::Configuration
    } else {
        FailureKind::Generic
    }
}

/// Collapses whitespace and truncates an upstream error body so that it
/// can be embedded in an error value without flooding logs.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    format!("{truncated}...")
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Result type alias for image editing operations.
pub type Result<T> = std::result::Result<T, ClearViewError>;
