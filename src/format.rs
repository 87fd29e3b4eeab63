//! Plain-text rendering of question records for the clipboard.
//!
//! ```text
//! What is the capital of France?
//!
//! a. Berlin
//! b. Paris
//!
//! Which planet is known as the Red Planet?
//!
//! a. Earth
//! b. Mars
//! ```

use crate::error::McqError;
use crate::output::QuestionRecord;

/// Label for the option at `index`: `a`, `b`, … `z`, then `aa`, `ab`, …
pub fn option_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        n -= 1;
        label.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    label.iter().rev().collect()
}

/// Question text, a blank line, then one labelled option per line.
pub fn format_record(record: &QuestionRecord) -> String {
    let mut text = format!("{}\n\n", record.question);
    for (i, option) in record.options.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", option_label(i), option));
    }
    text.trim_end().to_string()
}

/// All records, separated by a single blank line.
pub fn format_all(records: &[QuestionRecord]) -> String {
    records
        .iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim_end()
        .to_string()
}

/// The record at `index` (0-based).
pub fn format_one(records: &[QuestionRecord], index: usize) -> Result<String, McqError> {
    records
        .get(index)
        .map(format_record)
        .ok_or(McqError::IndexOutOfRange {
            index,
            len: records.len(),
        })
}
