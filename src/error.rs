//! Error types for the mcq-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`McqError`] — **Boundary**: an operation was refused outright (file is
//!   not an image, no provider configured, index out of range, clipboard write
//!   failed). Returned as `Err(McqError)` from public operations.
//!
//! * [`ExtractionFailure`] — **Classified outcome**: the extraction call ran
//!   but produced nothing usable (malformed JSON, wrong shape, transport
//!   fault). Stored inside [`crate::output::ExtractionResult::Failure`] and
//!   [`crate::controller::ExtractionState::ExtractionFailed`] so the caller
//!   always lands in a stable, retryable state.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown to the user for every [`ExtractionFailure`] variant.
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "The questions could not be extracted correctly. Please try again or check the image content.";

/// All boundary errors returned by the mcq-extract library.
///
/// Failures of the extraction call itself use [`ExtractionFailure`] and are
/// stored in the controller state rather than propagated here.
#[derive(Debug, Error)]
pub enum McqError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The selected file does not declare an `image/*` media type.
    #[error("Invalid file type: \"{name}\" ({media_type}). Please upload an image file (e.g., JPG, PNG).")]
    InvalidFileType { name: String, media_type: String },

    // ── Controller errors ─────────────────────────────────────────────────
    /// Extraction was triggered before any image was selected.
    #[error("Please select an image first.")]
    NoImageSelected,

    /// The transport client could not be constructed (missing credential etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ConfigurationError { provider: String, hint: String },

    /// The LLM API call failed (network, auth, or service error).
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Formatting / clipboard errors ─────────────────────────────────────
    /// A copy or format request addressed a question that does not exist.
    #[error("Question index {index} is out of range ({len} questions extracted)")]
    IndexOutOfRange { index: usize, len: usize },

    /// A copy was requested while no extracted questions are available.
    #[error("There are no extracted questions to copy")]
    NoResults,

    /// Writing to the system clipboard failed.
    #[error("Failed to copy text: {detail}")]
    ClipboardError { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A classified, non-fatal failure of one extraction attempt.
///
/// The three variants are distinguished for logging but presented to the
/// user identically through [`ExtractionFailure::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionFailure {
    /// The response text was not valid JSON.
    #[error("Malformed JSON in model response: {detail}")]
    MalformedJson { detail: String },

    /// The response was JSON but not an array of question objects.
    #[error("Unexpected response shape: {detail}")]
    UnexpectedShape { detail: String },

    /// The inference call itself failed (network or service error).
    #[error("Extraction call failed: {detail}")]
    Transport { detail: String },
}

impl ExtractionFailure {
    /// The message to show in the user interface.
    pub fn user_message(&self) -> &'static str {
        EXTRACTION_FAILED_MESSAGE
    }

    /// True when the failure came from parsing rather than the transport.
    pub fn is_parse_failure(&self) -> bool {
        !matches!(self, ExtractionFailure::Transport { .. })
    }
}
