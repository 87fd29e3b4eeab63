//! The extraction state machine.
//!
//! ```text
//!             select(image)              begin/extract
//!  NoImage ────────────────▶ ImageSelected ───────────▶ Extracting
//!     ▲                          ▲    ▲                   │
//!     │ select(None / non-image) │    │ select(image)     │ response parsed
//!     └──────────────────────────┘    │                   ▼
//!                                     └──── ResultReady | ExtractionFailed
//!                                                 │  (re-extract allowed)
//!                                                 └────────────▶ Extracting
//! ```
//!
//! One state value replaces the loading/error/result flags a UI would
//! otherwise juggle. At most one call is in flight: triggering while
//! `Extracting` is a no-op. Selecting a new image in any state discards the
//! previous result at once, and a response that arrives for a superseded
//! image is dropped.

use crate::clipboard::Clipboard;
use crate::config::ExtractorConfig;
use crate::error::{ExtractionFailure, McqError};
use crate::format;
use crate::output::{ExtractionResult, QuestionRecord};
use crate::pipeline::ingest::{CandidateFile, ImageIngestor, PreviewJob, RenderedPreview, SelectedImage};
use crate::pipeline::llm::{ExtractionTransport, LlmTransport};
use crate::pipeline::parse::parse_response;
use crate::pipeline::request::{ExtractionRequest, ExtractionRequestBuilder};
use crate::progress::ProgressCallback;
use tracing::{debug, info, warn};

/// Where the controller currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionState {
    /// Nothing selected.
    NoImage,
    /// An image is selected and no result is shown.
    ImageSelected,
    /// The extraction call is in flight.
    Extracting,
    /// The response parsed cleanly. An empty list means no questions were found.
    ResultReady(Vec<QuestionRecord>),
    /// The call or the parse failed; extraction may be retried.
    ExtractionFailed(ExtractionFailure),
}

impl ExtractionState {
    pub fn is_extracting(&self) -> bool {
        matches!(self, ExtractionState::Extracting)
    }

    /// Whether a new extraction may start from this state.
    pub fn can_extract(&self) -> bool {
        matches!(
            self,
            ExtractionState::ImageSelected
                | ExtractionState::ResultReady(_)
                | ExtractionState::ExtractionFailed(_)
        )
    }
}

impl From<ExtractionResult> for ExtractionState {
    fn from(result: ExtractionResult) -> Self {
        match result {
            ExtractionResult::Empty => ExtractionState::ResultReady(Vec::new()),
            ExtractionResult::Success(records) => ExtractionState::ResultReady(records),
            ExtractionResult::Failure(f) => ExtractionState::ExtractionFailed(f),
        }
    }
}

/// A started extraction, waiting for its transport outcome.
///
/// Hand it back through [`ExtractionController::finish_extraction`] or
/// [`ExtractionController::abandon_extraction`]; otherwise the controller
/// stays `Extracting` until the next selection.
#[derive(Debug)]
#[must_use = "settle the extraction with finish_extraction or abandon_extraction"]
pub struct PendingExtraction {
    generation: u64,
    request: ExtractionRequest,
}

impl PendingExtraction {
    pub fn request(&self) -> &ExtractionRequest {
        &self.request
    }

    /// Selection generation this extraction was started for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct ConfigFault {
    provider: String,
    hint: String,
}

impl ConfigFault {
    fn from_error(error: McqError) -> Self {
        match error {
            McqError::ConfigurationError { provider, hint } => Self { provider, hint },
            other => Self {
                provider: "unknown".to_string(),
                hint: other.to_string(),
            },
        }
    }

    fn to_error(&self) -> McqError {
        McqError::ConfigurationError {
            provider: self.provider.clone(),
            hint: self.hint.clone(),
        }
    }
}

/// Coordinates ingestion, the extraction call, parsing and copying.
pub struct ExtractionController<T = LlmTransport> {
    transport: Result<T, ConfigFault>,
    ingestor: ImageIngestor,
    request_builder: ExtractionRequestBuilder,
    state: ExtractionState,
    progress: Option<ProgressCallback>,
}

impl<T> std::fmt::Debug for ExtractionController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionController")
            .field("configured", &self.transport.is_ok())
            .field("image", &self.ingestor.current())
            .field("state", &self.state)
            .finish()
    }
}

impl ExtractionController<LlmTransport> {
    /// Build a controller whose transport is resolved from `config`.
    ///
    /// A missing credential does not fail construction: the controller comes
    /// up unconfigured, [`Self::configuration_error`] reports why, and every
    /// extraction attempt is refused.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::from_config_with(config, |var| std::env::var(var).ok())
    }

    /// [`Self::from_config`] reading environment variables through `lookup`.
    pub fn from_config_with(
        config: &ExtractorConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        match LlmTransport::from_config_with(config, lookup) {
            Ok(transport) => Self::new(transport, config),
            Err(e) => {
                warn!("Extraction client not initialised: {}", e);
                Self::not_configured(e, config)
            }
        }
    }
}

impl<T: ExtractionTransport> ExtractionController<T> {
    pub fn new(transport: T, config: &ExtractorConfig) -> Self {
        Self::with_transport(Ok(transport), config)
    }

    /// A controller that refuses to extract, reporting `error` instead.
    pub fn not_configured(error: McqError, config: &ExtractorConfig) -> Self {
        Self::with_transport(Err(ConfigFault::from_error(error)), config)
    }

    fn with_transport(transport: Result<T, ConfigFault>, config: &ExtractorConfig) -> Self {
        Self {
            transport,
            ingestor: ImageIngestor::new(config.preview_max_dimension),
            request_builder: ExtractionRequestBuilder::new(),
            state: ExtractionState::NoImage,
            progress: config.progress_callback.clone(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn state(&self) -> &ExtractionState {
        &self.state
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.ingestor.current()
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_ok()
    }

    /// Why the transport could not be initialised, if it could not.
    pub fn configuration_error(&self) -> Option<McqError> {
        self.transport.as_ref().err().map(ConfigFault::to_error)
    }

    /// Extracted records; empty unless a result is ready.
    pub fn records(&self) -> &[QuestionRecord] {
        match &self.state {
            ExtractionState::ResultReady(records) => records,
            _ => &[],
        }
    }

    /// The settled outcome of the last extraction, if any.
    pub fn result(&self) -> Option<ExtractionResult> {
        match &self.state {
            ExtractionState::ResultReady(records) => Some(ExtractionResult::from(records.clone())),
            ExtractionState::ExtractionFailed(f) => Some(ExtractionResult::Failure(f.clone())),
            _ => None,
        }
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Select, replace, or clear the image. Any previous result is discarded
    /// before this returns, whatever the outcome.
    pub fn select_image(
        &mut self,
        candidate: Option<CandidateFile>,
    ) -> Result<Option<PreviewJob>, McqError> {
        let outcome = self.ingestor.accept(candidate);
        self.after_selection();
        outcome
    }

    /// Select the first of several dropped files.
    pub fn select_dropped(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Option<PreviewJob>, McqError> {
        let outcome = self.ingestor.accept_dropped(files);
        self.after_selection();
        outcome
    }

    fn after_selection(&mut self) {
        self.state = match self.ingestor.current() {
            Some(image) => {
                if let Some(ref cb) = self.progress {
                    cb.on_image_selected(image.name(), image.bytes().len());
                }
                ExtractionState::ImageSelected
            }
            None => ExtractionState::NoImage,
        };
    }

    /// Attach a finished preview; stale previews are ignored.
    pub fn apply_preview(&mut self, rendered: RenderedPreview) -> bool {
        self.ingestor.apply_preview(rendered)
    }

    // ── Extraction ───────────────────────────────────────────────────────

    /// Move to `Extracting` and hand back the request to send.
    ///
    /// Returns `Ok(None)` without any state change while an extraction is
    /// already in flight.
    pub fn begin_extraction(&mut self) -> Result<Option<PendingExtraction>, McqError> {
        if self.state.is_extracting() {
            debug!("Extraction already in flight; trigger ignored");
            return Ok(None);
        }

        let image = self.ingestor.current().ok_or(McqError::NoImageSelected)?;
        if let Err(fault) = &self.transport {
            return Err(fault.to_error());
        }

        let request = self.request_builder.build(image);
        let pending = PendingExtraction {
            generation: image.generation(),
            request,
        };

        info!("Extracting questions from '{}'", image.name());
        if let Some(ref cb) = self.progress {
            cb.on_extraction_start(image.name());
        }
        self.state = ExtractionState::Extracting;
        Ok(Some(pending))
    }

    /// Settle a pending extraction with the transport's outcome.
    ///
    /// Returns `false` if the image was replaced or cleared since the
    /// extraction began; the outcome is then dropped.
    pub fn finish_extraction(
        &mut self,
        pending: PendingExtraction,
        outcome: Result<String, McqError>,
    ) -> bool {
        let current = self.ingestor.current().map(SelectedImage::generation);
        if !self.state.is_extracting() || current != Some(pending.generation) {
            debug!(
                "Dropping stale extraction outcome (generation {}, current {:?})",
                pending.generation, current
            );
            return false;
        }

        let result = match outcome {
            Ok(text) => parse_response(&text),
            Err(e) => ExtractionResult::Failure(ExtractionFailure::Transport {
                detail: e.to_string(),
            }),
        };

        match &result {
            ExtractionResult::Failure(f) => {
                warn!("Extraction failed: {}", f);
                if let Some(ref cb) = self.progress {
                    cb.on_extraction_error(&f.to_string());
                }
            }
            other => {
                info!("Extracted {} questions", other.len());
                if let Some(ref cb) = self.progress {
                    cb.on_extraction_complete(other.len());
                }
            }
        }

        self.state = ExtractionState::from(result);
        true
    }

    /// Give up on a pending extraction without an outcome.
    ///
    /// Returns to `ImageSelected` so extraction can be triggered again.
    /// Returns `false`, changing nothing, if the extraction is already stale.
    pub fn abandon_extraction(&mut self, pending: PendingExtraction) -> bool {
        let current = self.ingestor.current().map(SelectedImage::generation);
        if !self.state.is_extracting() || current != Some(pending.generation) {
            return false;
        }
        warn!("Extraction abandoned before an outcome arrived");
        self.state = ExtractionState::ImageSelected;
        true
    }

    /// Run one extraction end to end against the current image.
    ///
    /// Transport and parse failures are not errors here: they settle the
    /// state in [`ExtractionState::ExtractionFailed`]. `Err` is returned only
    /// when the extraction could not start at all.
    pub async fn extract(&mut self) -> Result<&ExtractionState, McqError> {
        let Some(pending) = self.begin_extraction()? else {
            return Ok(&self.state);
        };
        let outcome = self.transport_ref()?.send(pending.request()).await;
        self.finish_extraction(pending, outcome);
        Ok(&self.state)
    }

    fn transport_ref(&self) -> Result<&T, McqError> {
        self.transport.as_ref().map_err(ConfigFault::to_error)
    }

    // ── Copying ──────────────────────────────────────────────────────────

    /// Copy every extracted question. Never changes the extraction state.
    pub fn copy_all(&self, clipboard: &mut impl Clipboard) -> Result<(), McqError> {
        let records = self.records();
        if records.is_empty() {
            return Err(McqError::NoResults);
        }
        write_clipboard(clipboard, &format::format_all(records))
    }

    /// Copy the question at `index` (0-based). Never changes the extraction state.
    pub fn copy_one(&self, clipboard: &mut impl Clipboard, index: usize) -> Result<(), McqError> {
        let records = self.records();
        if records.is_empty() {
            return Err(McqError::NoResults);
        }
        write_clipboard(clipboard, &format::format_one(records, index)?)
    }
}

fn write_clipboard(clipboard: &mut impl Clipboard, text: &str) -> Result<(), McqError> {
    clipboard.set_text(text).inspect_err(|e| {
        warn!("Clipboard write failed: {}", e);
    })?;
    debug!("Copied {} bytes to clipboard", text.len());
    Ok(())
}
