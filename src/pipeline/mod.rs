//! Pipeline stages for image-to-questions extraction.
//!
//! Each submodule implements one step. The controller drives them in order
//! and owns the state between steps.
//!
//! ## Data Flow
//!
//! ```text
//! ingest ──▶ encode ──▶ request ──▶ llm ──▶ parse
//! (file/URL)  (base64)   (payload)   (VLM)   (records)
//! ```
//!
//! 1. [`ingest`]  — accept or reject a candidate file, keep the bytes, and
//!    schedule the preview render on a blocking thread
//! 2. [`encode`]  — base64 for the request body, downscaled PNG for previews
//! 3. [`request`] — pair the encoded image with the fixed instruction
//! 4. [`llm`]     — the single network call; no retry
//! 5. [`parse`]   — strip a Markdown fence, decode JSON, validate the shape

pub mod encode;
pub mod ingest;
pub mod llm;
pub mod parse;
pub mod request;
