//! Request construction: the selected image plus the frozen instruction.

use crate::pipeline::ingest::SelectedImage;
use crate::prompts::EXTRACTION_INSTRUCTION;
use std::fmt;

/// Output format the transport is asked to produce.
///
/// This is only a hint; the parser never assumes it was honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Machine-readable JSON text, no prose wrapping.
    #[default]
    Json,
}

impl ResponseFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json",
        }
    }
}

/// Everything the transport needs for one extraction call.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    image_base64: String,
    media_type: String,
    instruction: &'static str,
    response_format: ResponseFormat,
}

impl fmt::Debug for ExtractionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRequest")
            .field("image_base64", &format_args!("<{} bytes>", self.image_base64.len()))
            .field("media_type", &self.media_type)
            .field("response_format", &self.response_format)
            .finish()
    }
}

impl ExtractionRequest {
    pub fn image_base64(&self) -> &str {
        &self.image_base64
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn instruction(&self) -> &'static str {
        self.instruction
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }
}

/// Builds [`ExtractionRequest`]s. The instruction text is not configurable.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequestBuilder {
    response_format: ResponseFormat,
}

impl ExtractionRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&self, image: &SelectedImage) -> ExtractionRequest {
        ExtractionRequest {
            image_base64: image.base64().to_string(),
            media_type: image.media_type().to_string(),
            instruction: EXTRACTION_INSTRUCTION,
            response_format: self.response_format,
        }
    }
}
