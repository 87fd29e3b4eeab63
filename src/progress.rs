//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractorConfigBuilder::progress_callback`] to be told when
//! an image is selected and when an extraction starts, succeeds, or fails.
//! The CLI uses it to drive a spinner; a GUI host can use it to toggle its
//! loading indicator without polling the controller.
//!
//! # Example
//!
//! ```rust
//! use mcq_extract::{ExtractionProgressCallback, ExtractorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     questions: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_extraction_complete(&self, question_count: usize) {
//!         self.questions.store(question_count, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { questions: AtomicUsize::new(0) });
//!
//! let config = ExtractorConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::controller::ExtractionController`] on state changes.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// A new image was accepted.
    fn on_image_selected(&self, name: &str, size_bytes: usize) {
        let _ = (name, size_bytes);
    }

    /// The extraction request is about to be sent.
    fn on_extraction_start(&self, name: &str) {
        let _ = name;
    }

    /// The response parsed cleanly; `question_count` may be zero.
    fn on_extraction_complete(&self, question_count: usize) {
        let _ = question_count;
    }

    /// The call or the parse failed.
    fn on_extraction_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractorConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
