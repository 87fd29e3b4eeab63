//! # mcq-extract
//!
//! Extract multiple-choice questions from an image using Vision Language
//! Models (VLMs).
//!
//! ## Why this crate?
//!
//! Photographed worksheets and screenshotted quizzes are a poor fit for OCR:
//! the text comes out, but which line is a question and which lines are its
//! options is lost. This crate sends the image to a VLM with a fixed
//! instruction asking for a JSON array of `{question, options}` objects,
//! validates what comes back, and formats it as plain text ready to paste.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Image (file, URL, or dropped bytes)
//!  │
//!  ├─ 1. Ingest   accept image/*, reject the rest, render preview off-thread
//!  ├─ 2. Encode   bytes → base64
//!  ├─ 3. Request  image + fixed instruction, JSON response requested
//!  ├─ 4. VLM      one call to gemini / gpt / claude / …
//!  ├─ 5. Parse    strip ``` fence, decode, validate [{question, options}]
//!  └─ 6. Format   "question\n\na. option\nb. option" → clipboard
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcq_extract::{CandidateFile, ExtractionController, ExtractionState, ExtractorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ExtractorConfig::default();
//!     let mut controller = ExtractionController::from_config(&config);
//!
//!     let bytes = std::fs::read("quiz.png")?;
//!     controller.select_image(Some(CandidateFile::new("quiz.png", "image/png", bytes)))?;
//!
//!     if let ExtractionState::ResultReady(records) = controller.extract().await? {
//!         println!("{}", mcq_extract::format_all(records));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `mcq-extract` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `clipboard` | on (via `cli`) | [`SystemClipboard`] backed by `arboard` |
//!
//! Disable default features when using only the library:
//! ```toml
//! mcq-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clipboard;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "clipboard")]
pub use clipboard::SystemClipboard;
pub use clipboard::{Clipboard, MemoryClipboard};
pub use config::{ExtractorConfig, ExtractorConfigBuilder, DEFAULT_MODEL};
pub use controller::{ExtractionController, ExtractionState, PendingExtraction};
pub use error::{ExtractionFailure, McqError, EXTRACTION_FAILED_MESSAGE};
pub use format::{format_all, format_one, format_record, option_label};
pub use output::{ExtractionResult, QuestionRecord};
pub use pipeline::ingest::{
    resolve_candidate, CandidateFile, ImageIngestor, PreviewJob, RenderedPreview, SelectedImage,
};
pub use pipeline::llm::{ExtractionTransport, LlmTransport};
pub use pipeline::parse::{parse_response, strip_code_fence};
pub use pipeline::request::{ExtractionRequest, ExtractionRequestBuilder, ResponseFormat};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
