//! Controller-level integration tests.
//!
//! Every test drives the public API with an in-process transport that replays
//! canned replies, so nothing here touches the network.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mcq_extract::{
    resolve_candidate, CandidateFile, Clipboard, ExtractionController, ExtractionFailure,
    ExtractionProgressCallback, ExtractionRequest, ExtractionResult, ExtractionState,
    ExtractionTransport, ExtractorConfig, McqError, MemoryClipboard, QuestionRecord,
    ResponseFormat, EXTRACTION_FAILED_MESSAGE,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SentRequest {
    media_type: String,
    image_base64: String,
    instruction: &'static str,
    response_format: ResponseFormat,
}

/// Replays scripted replies in order and records what it was sent.
struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<String, McqError>>>,
    sent: RefCell<Vec<SentRequest>>,
}

impl ScriptedTransport {
    fn replying(replies: impl IntoIterator<Item = Result<String, McqError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn ok(reply: &str) -> Self {
        Self::replying([Ok(reply.to_string())])
    }
}

impl ExtractionTransport for ScriptedTransport {
    async fn send(&self, request: &ExtractionRequest) -> Result<String, McqError> {
        self.sent.borrow_mut().push(SentRequest {
            media_type: request.media_type().to_string(),
            image_base64: request.image_base64().to_string(),
            instruction: request.instruction(),
            response_format: request.response_format(),
        });
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(McqError::Internal("no scripted reply left".into())))
    }
}

/// Lets a test keep a handle on the transport the controller owns.
struct SharedTransport(Arc<ScriptedTransport>);

impl ExtractionTransport for SharedTransport {
    async fn send(&self, request: &ExtractionRequest) -> Result<String, McqError> {
        self.0.send(request).await
    }
}

fn controller_with(
    transport: ScriptedTransport,
) -> (ExtractionController<SharedTransport>, Arc<ScriptedTransport>) {
    let shared = Arc::new(transport);
    let controller =
        ExtractionController::new(SharedTransport(Arc::clone(&shared)), &ExtractorConfig::default());
    (controller, shared)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn png(name: &str) -> CandidateFile {
    CandidateFile::new(name, "image/png", png_bytes(8, 8))
}

const TWO_QUESTIONS: &str = r#"[
  {"question": "What is the capital of France?", "options": ["Berlin", "Madrid", "Paris", "Rome"]},
  {"question": "2 + 2 = ?", "options": ["3", "4"]}
]"#;

struct FailingClipboard;

impl Clipboard for FailingClipboard {
    fn set_text(&mut self, _text: &str) -> Result<(), McqError> {
        Err(McqError::ClipboardError {
            detail: "no display".into(),
        })
    }
}

// ── Selection and state ──────────────────────────────────────────────────────

#[tokio::test]
async fn extracts_records_in_order() {
    let (mut c, transport) = controller_with(ScriptedTransport::ok(TWO_QUESTIONS));
    c.select_image(Some(png("quiz.png"))).unwrap();

    let state = c.extract().await.unwrap().clone();
    let ExtractionState::ResultReady(records) = state else {
        panic!("expected results");
    };
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].question, "What is the capital of France?");
    assert_eq!(records[0].options, vec!["Berlin", "Madrid", "Paris", "Rome"]);
    assert_eq!(records[1].options, vec!["3", "4"]);
    assert_eq!(transport.sent.borrow().len(), 1);
}

#[tokio::test]
async fn request_carries_image_and_instruction() {
    let (mut c, transport) = controller_with(ScriptedTransport::ok("[]"));
    let bytes = png_bytes(4, 4);
    c.select_image(Some(CandidateFile::new("q.png", "image/png", bytes.clone())))
        .unwrap();
    c.extract().await.unwrap();

    let sent = transport.sent.borrow();
    let req = &sent[0];
    assert_eq!(req.media_type, "image/png");
    assert_eq!(STANDARD.decode(&req.image_base64).unwrap(), bytes);
    assert!(req.instruction.contains("question"));
    assert_eq!(req.response_format, ResponseFormat::Json);
}

#[tokio::test]
async fn new_selection_clears_result_before_any_call() {
    let (mut c, transport) = controller_with(ScriptedTransport::ok(TWO_QUESTIONS));
    c.select_image(Some(png("first.png"))).unwrap();
    c.extract().await.unwrap();
    assert_eq!(c.records().len(), 2);

    c.select_image(Some(png("second.png"))).unwrap();
    assert_eq!(c.state(), &ExtractionState::ImageSelected);
    assert!(c.records().is_empty());
    assert!(c.result().is_none());
    assert_eq!(c.image().unwrap().name(), "second.png");
    assert_eq!(transport.sent.borrow().len(), 1);
}

#[tokio::test]
async fn trigger_while_extracting_issues_no_second_call() {
    let (mut c, transport) = controller_with(ScriptedTransport::ok(TWO_QUESTIONS));
    c.select_image(Some(png("quiz.png"))).unwrap();

    let pending = c.begin_extraction().unwrap().expect("extraction should start");
    let state = c.extract().await.unwrap().clone();
    assert_eq!(state, ExtractionState::Extracting);
    assert!(transport.sent.borrow().is_empty());

    assert!(c.finish_extraction(pending, Ok("[]".to_string())));
    assert_eq!(c.state(), &ExtractionState::ResultReady(Vec::new()));
}

#[tokio::test]
async fn non_image_leaves_nothing_visible() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok(TWO_QUESTIONS));
    let job = c.select_image(Some(png("quiz.png"))).unwrap().unwrap();
    let rendered = job.render().await.unwrap();
    assert!(c.apply_preview(rendered));
    c.extract().await.unwrap();
    assert!(!c.records().is_empty());

    let err = c
        .select_image(Some(CandidateFile::new(
            "notes.txt",
            "text/plain",
            b"hello".to_vec(),
        )))
        .unwrap_err();
    match err {
        McqError::InvalidFileType { name, media_type } => {
            assert_eq!(name, "notes.txt");
            assert_eq!(media_type, "text/plain");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(c.state(), &ExtractionState::NoImage);
    assert!(c.image().is_none());
    assert!(c.records().is_empty());
}

#[test]
fn clearing_selection_returns_to_no_image() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok("[]"));
    c.select_image(Some(png("quiz.png"))).unwrap();
    assert!(c.select_image(None).unwrap().is_none());
    assert_eq!(c.state(), &ExtractionState::NoImage);
    assert!(matches!(c.begin_extraction(), Err(McqError::NoImageSelected)));
}

#[test]
fn only_first_dropped_file_is_used() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok("[]"));
    c.select_dropped(vec![png("a.png"), png("b.png")]).unwrap();
    assert_eq!(c.image().unwrap().name(), "a.png");
}

// ── Failures and retry ───────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_reply_is_retryable() {
    let (mut c, transport) = controller_with(ScriptedTransport::replying([
        Ok("Sure! Here are the questions:".to_string()),
        Ok(TWO_QUESTIONS.to_string()),
    ]));
    c.select_image(Some(png("quiz.png"))).unwrap();

    let state = c.extract().await.unwrap().clone();
    match &state {
        ExtractionState::ExtractionFailed(f @ ExtractionFailure::MalformedJson { .. }) => {
            assert_eq!(f.user_message(), EXTRACTION_FAILED_MESSAGE);
        }
        other => panic!("expected malformed JSON failure, got {other:?}"),
    }
    assert!(c.state().can_extract());

    c.extract().await.unwrap();
    assert_eq!(c.records().len(), 2);
    assert_eq!(transport.sent.borrow().len(), 2);
}

#[tokio::test]
async fn wrong_shape_is_failure_not_partial_success() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok(
        r#"[{"question":"Q1","options":["A"]}, "stray"]"#,
    ));
    c.select_image(Some(png("quiz.png"))).unwrap();
    c.extract().await.unwrap();
    assert!(matches!(
        c.result(),
        Some(ExtractionResult::Failure(ExtractionFailure::UnexpectedShape { .. }))
    ));
    assert!(c.records().is_empty());
}

#[tokio::test]
async fn transport_error_is_retryable_failure() {
    let (mut c, _transport) = controller_with(ScriptedTransport::replying([
        Err(McqError::LlmApiError {
            message: "429 Too Many Requests".into(),
        }),
        Ok("[]".to_string()),
    ]));
    c.select_image(Some(png("quiz.png"))).unwrap();

    c.extract().await.unwrap();
    match c.state() {
        ExtractionState::ExtractionFailed(f) => {
            assert!(!f.is_parse_failure());
            assert!(f.to_string().contains("429"));
        }
        other => panic!("unexpected state {other:?}"),
    }

    c.extract().await.unwrap();
    assert_eq!(c.result(), Some(ExtractionResult::Empty));
}

#[tokio::test]
async fn unconfigured_controller_never_calls_transport() {
    let mut c: ExtractionController<SharedTransport> = ExtractionController::not_configured(
        McqError::ConfigurationError {
            provider: "gemini".into(),
            hint: "The GEMINI_API_KEY environment variable is not set.".into(),
        },
        &ExtractorConfig::default(),
    );
    assert!(matches!(
        c.configuration_error(),
        Some(McqError::ConfigurationError { .. })
    ));
    c.select_image(Some(png("quiz.png"))).unwrap();
    let err = c.extract().await.unwrap_err();
    assert!(err.to_string().contains("GEMINI_API_KEY"));
    assert_eq!(c.state(), &ExtractionState::ImageSelected);
}

// ── Copying ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn copy_all_and_copy_one_format_text() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok(
        r#"[{"question":"Q1","options":["X"]},{"question":"Q2","options":["Y","Z"]}]"#,
    ));
    c.select_image(Some(png("quiz.png"))).unwrap();
    c.extract().await.unwrap();

    let mut clipboard = MemoryClipboard::new();
    c.copy_all(&mut clipboard).unwrap();
    assert_eq!(clipboard.contents(), Some("Q1\n\na. X\n\nQ2\n\na. Y\nb. Z"));

    c.copy_one(&mut clipboard, 1).unwrap();
    assert_eq!(clipboard.contents(), Some("Q2\n\na. Y\nb. Z"));

    assert!(matches!(
        c.copy_one(&mut clipboard, 5),
        Err(McqError::IndexOutOfRange { index: 5, len: 2 })
    ));
    assert_eq!(clipboard.contents(), Some("Q2\n\na. Y\nb. Z"));
}

#[tokio::test]
async fn empty_result_has_nothing_to_copy() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok("```json\n[]\n```"));
    c.select_image(Some(png("blank.png"))).unwrap();
    c.extract().await.unwrap();
    assert_eq!(c.state(), &ExtractionState::ResultReady(Vec::new()));

    let mut clipboard = MemoryClipboard::new();
    assert!(matches!(c.copy_all(&mut clipboard), Err(McqError::NoResults)));
}

#[tokio::test]
async fn clipboard_failure_keeps_results() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok(TWO_QUESTIONS));
    c.select_image(Some(png("quiz.png"))).unwrap();
    c.extract().await.unwrap();
    let before = c.state().clone();

    let err = c.copy_all(&mut FailingClipboard).unwrap_err();
    assert!(matches!(err, McqError::ClipboardError { .. }));
    assert_eq!(c.state(), &before);
}

// ── Previews and file input ──────────────────────────────────────────────────

#[tokio::test]
async fn stale_preview_does_not_overwrite_newer_selection() {
    let (mut c, _transport) = controller_with(ScriptedTransport::ok("[]"));
    let old_job = c.select_image(Some(png("old.png"))).unwrap().unwrap();
    let new_job = c.select_image(Some(png("new.png"))).unwrap().unwrap();

    let old = old_job.render().await.unwrap();
    assert!(!c.apply_preview(old));
    assert!(c.image().unwrap().preview().is_none());

    let new = new_job.render().await.unwrap();
    assert!(c.apply_preview(new));
    assert!(c.image().unwrap().preview().is_some());
}

#[tokio::test]
async fn local_file_is_downscaled_for_preview() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.png");
    std::fs::write(&path, png_bytes(1200, 600)).unwrap();

    let candidate = resolve_candidate(path.to_str().unwrap(), 5).await.unwrap();
    assert_eq!(candidate.media_type, "image/png");

    let (mut c, _transport) = controller_with(ScriptedTransport::ok("[]"));
    let job = c.select_image(Some(candidate)).unwrap().unwrap();
    assert!(c.apply_preview(job.render().await.unwrap()));

    let preview = c.image().unwrap().preview().unwrap();
    assert!(preview.data_uri.starts_with("data:image/png;base64,"));
    let (w, h) = preview.dimensions.unwrap();
    assert!(w <= 512 && h <= 512, "preview is {w}x{h}");
}

#[tokio::test]
async fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = resolve_candidate(dir.path().join("nope.png").to_str().unwrap(), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, McqError::FileNotFound { .. }));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingCallback {
    selected: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    last_count: AtomicUsize,
}

impl ExtractionProgressCallback for CountingCallback {
    fn on_image_selected(&self, _name: &str, _size_bytes: usize) {
        self.selected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_extraction_start(&self, _name: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_extraction_complete(&self, question_count: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.last_count.store(question_count, Ordering::SeqCst);
    }

    fn on_extraction_error(&self, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_events_follow_state_changes() {
    let counter = Arc::new(CountingCallback::default());
    let config = ExtractorConfig::builder()
        .progress_callback(Arc::clone(&counter) as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::replying([
        Ok("{\"oops\": true}".to_string()),
        Ok(TWO_QUESTIONS.to_string()),
    ]));
    let mut c = ExtractionController::new(SharedTransport(Arc::clone(&transport)), &config);

    c.select_image(Some(png("quiz.png"))).unwrap();
    c.extract().await.unwrap();
    c.extract().await.unwrap();

    assert_eq!(counter.selected.load(Ordering::SeqCst), 1);
    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.last_count.load(Ordering::SeqCst), 2);
}

#[test]
fn records_serialize_for_json_output() {
    let records = vec![QuestionRecord::new("Q1", vec!["A".into(), "B".into()])];
    let json = serde_json::to_string(&records).unwrap();
    assert_eq!(json, r#"[{"question":"Q1","options":["A","B"]}]"#);
}
