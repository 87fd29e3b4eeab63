//! Image ingestion: accept a user-supplied file, validate it, and hold it.
//!
//! A candidate arrives from a file picker, a drag-and-drop, a local path or a
//! URL. Only the *declared* media type decides whether it is accepted: anything
//! outside `image/*` is rejected and the previous selection is dropped with it.
//!
//! Preview rendering is asynchronous and may finish after the user has already
//! picked another file. Every selection therefore bumps a generation counter,
//! and a [`RenderedPreview`] is applied only if its generation is still current.

use crate::error::McqError;
use crate::pipeline::encode::{self, ImagePreview};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Media type used when a file's type cannot be determined.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// A file offered for selection, before validation.
#[derive(Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Display name (file name, or last URL segment).
    pub name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Whether the declared media type is in the `image/` category.
    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Guess a media type from a path's extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or(UNKNOWN_MEDIA_TYPE)
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL into a [`CandidateFile`].
///
/// The candidate is not validated here; pass it to [`ImageIngestor::accept`].
pub async fn resolve_candidate(input: &str, timeout_secs: u64) -> Result<CandidateFile, McqError> {
    if input.trim().is_empty() {
        return Err(McqError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<CandidateFile, McqError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => McqError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => McqError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(CandidateFile::new(name, media_type_for_path(path), bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<CandidateFile, McqError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| McqError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            McqError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            McqError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(McqError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let media_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| media_type_for_path(Path::new(&name)).to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| McqError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes ({})", bytes.len(), media_type);
    Ok(CandidateFile::new(name, media_type, bytes.to_vec()))
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded-image".to_string()
}

/// The currently selected, validated image.
///
/// The base64 encoding is derived lazily on first use and never changes
/// afterwards.
pub struct SelectedImage {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
    encoded: OnceCell<String>,
    preview: Option<ImagePreview>,
    generation: u64,
}

impl fmt::Debug for SelectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedImage")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.bytes.len())
            .field("has_preview", &self.preview.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

impl SelectedImage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 of the raw payload, computed once.
    pub fn base64(&self) -> &str {
        self.encoded.get_or_init(|| encode::encode_base64(&self.bytes))
    }

    /// The rendered preview, once its job has completed.
    pub fn preview(&self) -> Option<&ImagePreview> {
        self.preview.as_ref()
    }

    /// Selection counter value this image was accepted under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Deferred preview rendering for one selection.
#[derive(Debug, Clone)]
pub struct PreviewJob {
    generation: u64,
    media_type: String,
    bytes: Arc<[u8]>,
    max_dimension: u32,
}

impl PreviewJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Render the preview on the blocking pool.
    pub async fn render(self) -> Result<RenderedPreview, McqError> {
        let generation = self.generation;
        let preview = tokio::task::spawn_blocking(move || {
            encode::render_preview(&self.bytes, &self.media_type, self.max_dimension)
        })
        .await
        .map_err(|e| McqError::Internal(format!("preview task failed: {}", e)))?;
        Ok(RenderedPreview {
            generation,
            preview,
        })
    }

    /// Render the preview on the current thread.
    pub fn render_blocking(self) -> RenderedPreview {
        RenderedPreview {
            generation: self.generation,
            preview: encode::render_preview(&self.bytes, &self.media_type, self.max_dimension),
        }
    }
}

/// A finished preview, tagged with the selection it belongs to.
#[derive(Debug, Clone)]
pub struct RenderedPreview {
    generation: u64,
    preview: ImagePreview,
}

impl RenderedPreview {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn preview(&self) -> &ImagePreview {
        &self.preview
    }
}

/// Owns the current image selection.
#[derive(Debug)]
pub struct ImageIngestor {
    current: Option<SelectedImage>,
    generation: u64,
    preview_max_dimension: u32,
}

impl Default for ImageIngestor {
    fn default() -> Self {
        Self::new(512)
    }
}

impl ImageIngestor {
    pub fn new(preview_max_dimension: u32) -> Self {
        Self {
            current: None,
            generation: 0,
            preview_max_dimension,
        }
    }

    /// Accept, replace, or clear the selection.
    ///
    /// * `None` clears the selection and returns `Ok(None)`.
    /// * A non-image candidate clears the selection and returns
    ///   [`McqError::InvalidFileType`].
    /// * An image candidate becomes the new selection; the returned
    ///   [`PreviewJob`] renders its preview.
    ///
    /// Every call supersedes any preview job still in flight.
    pub fn accept(&mut self, candidate: Option<CandidateFile>) -> Result<Option<PreviewJob>, McqError> {
        self.generation += 1;
        self.current = None;

        let Some(candidate) = candidate else {
            debug!("Selection cleared");
            return Ok(None);
        };

        if !candidate.is_image() {
            warn!(
                "Rejected '{}': media type '{}' is not an image",
                candidate.name, candidate.media_type
            );
            return Err(McqError::InvalidFileType {
                name: candidate.name,
                media_type: candidate.media_type,
            });
        }

        info!(
            "Selected image '{}' ({}, {} bytes)",
            candidate.name,
            candidate.media_type,
            candidate.bytes.len()
        );

        let bytes: Arc<[u8]> = Arc::from(candidate.bytes);
        let job = PreviewJob {
            generation: self.generation,
            media_type: candidate.media_type.clone(),
            bytes: Arc::clone(&bytes),
            max_dimension: self.preview_max_dimension,
        };

        self.current = Some(SelectedImage {
            name: candidate.name,
            media_type: candidate.media_type,
            bytes,
            encoded: OnceCell::new(),
            preview: None,
            generation: self.generation,
        });

        Ok(Some(job))
    }

    /// Accept the first of several dropped files; an empty drop clears.
    pub fn accept_dropped(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Option<PreviewJob>, McqError> {
        self.accept(files.into_iter().next())
    }

    /// Attach a finished preview. Returns `false` for a superseded selection.
    pub fn apply_preview(&mut self, rendered: RenderedPreview) -> bool {
        match self.current.as_mut() {
            Some(image) if image.generation == rendered.generation => {
                image.preview = Some(rendered.preview);
                true
            }
            _ => {
                debug!(
                    "Ignoring stale preview (generation {}, current {})",
                    rendered.generation, self.generation
                );
                false
            }
        }
    }

    pub fn current(&self) -> Option<&SelectedImage> {
        self.current.as_ref()
    }

    /// Current selection counter value.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
