//! Response parsing: untrusted model text → validated question records.
//!
//! The model is asked for a bare JSON array, but its output is still only
//! weakly structured text. Parsing runs three independent steps:
//!
//! 1. [`strip_code_fence`] — remove an outer ` ```json … ``` ` wrapper
//! 2. JSON syntax check — failure is [`ExtractionFailure::MalformedJson`]
//! 3. Shape check — every element must be `{"question": string,
//!    "options": [string, …]}`; any deviation is
//!    [`ExtractionFailure::UnexpectedShape`]
//!
//! Validation is all-or-nothing. One bad element rejects the whole response:
//! a half-extracted question set gives the user no way to tell which half to
//! trust.

use crate::error::ExtractionFailure;
use crate::output::{ExtractionResult, QuestionRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Parse a raw model response into an [`ExtractionResult`].
///
/// Never panics and never returns an error: every outcome, including garbage
/// input, maps to one of the three result variants.
pub fn parse_response(raw: &str) -> ExtractionResult {
    let body = strip_code_fence(raw.trim());

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model response is not valid JSON: {}", e);
            return ExtractionResult::Failure(ExtractionFailure::MalformedJson {
                detail: e.to_string(),
            });
        }
    };

    match validate(value) {
        Ok(records) => {
            debug!("Parsed {} question records", records.len());
            ExtractionResult::from(records)
        }
        Err(detail) => {
            warn!("Model response has unexpected shape: {}", detail);
            ExtractionResult::Failure(ExtractionFailure::UnexpectedShape { detail })
        }
    }
}

// ── Step 1: Strip an outer code fence ────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").unwrap());

/// Return the interior of a fenced block spanning the whole input, or the
/// trimmed input unchanged when there is no such fence.
pub fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(2)) {
        Some(inner) if !inner.as_str().trim().is_empty() => inner.as_str().trim(),
        _ => trimmed,
    }
}

// ── Step 3: Shape validation ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawRecord {
    question: String,
    options: Vec<String>,
}

fn validate(value: Value) -> Result<Vec<QuestionRecord>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected a JSON array, got {}", kind_of(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| validate_item(i, item))
        .collect()
}

fn validate_item(index: usize, item: Value) -> Result<QuestionRecord, String> {
    if !item.is_object() {
        return Err(format!(
            "element {} is {}, expected an object",
            index,
            kind_of(&item)
        ));
    }

    let raw: RawRecord =
        serde_json::from_value(item).map_err(|e| format!("element {}: {}", index, e))?;

    if raw.question.trim().is_empty() {
        return Err(format!("element {}: question text is empty", index));
    }

    Ok(QuestionRecord {
        question: raw.question,
        options: raw.options,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
