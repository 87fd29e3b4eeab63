//! Image encoding: raw bytes → base64 payload and a displayable preview.
//!
//! VLM APIs accept images as base64 embedded in the JSON request body, so the
//! original bytes are sent untouched (no re-encoding, no quality loss). The
//! preview is a separate, downscaled PNG data-URI meant only for display.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::{debug, warn};

/// Base64-encode an image payload for the request body.
pub fn encode_base64(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    b64
}

/// Build a `data:` URI from a media type and raw bytes.
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// A locally displayable rendition of the selected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreview {
    /// `data:` URI suitable for an `<img src>` or a terminal image viewer.
    pub data_uri: String,
    /// Pixel size of the preview, when the image could be decoded.
    pub dimensions: Option<(u32, u32)>,
}

/// Render a preview no larger than `max_dimension` on either side.
///
/// Undecodable bytes (a format the `image` crate was not built with, or a
/// truncated file) still produce a preview: the original payload wrapped in a
/// data-URI with the declared media type.
pub fn render_preview(bytes: &[u8], media_type: &str, max_dimension: u32) -> ImagePreview {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let img = shrink_to_fit(img, max_dimension);
            let dimensions = (img.width(), img.height());
            let mut buf = Vec::new();
            match img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
                Ok(()) => ImagePreview {
                    data_uri: data_uri("image/png", &buf),
                    dimensions: Some(dimensions),
                },
                Err(e) => {
                    warn!("Preview encoding failed, using original bytes: {}", e);
                    passthrough(bytes, media_type)
                }
            }
        }
        Err(e) => {
            warn!("Preview decode failed, using original bytes: {}", e);
            passthrough(bytes, media_type)
        }
    }
}

fn passthrough(bytes: &[u8], media_type: &str) -> ImagePreview {
    ImagePreview {
        data_uri: data_uri(media_type, bytes),
        dimensions: None,
    }
}

/// Downscale so neither side exceeds `max_dimension`, keeping aspect ratio.
fn shrink_to_fit(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.thumbnail(max_dimension, max_dimension)
}
