//! Output types: extracted question records and the extraction outcome.

use crate::error::ExtractionFailure;
use serde::{Deserialize, Serialize};

/// One multiple-choice question with its answer options.
///
/// Option order is significant: it defines the `a.`, `b.`, `c.` … labels used
/// when the record is displayed or copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Full question text. Never empty.
    pub question: String,
    /// Answer choices, without enumeration prefixes. May be empty.
    pub options: Vec<String>,
}

impl QuestionRecord {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            options,
        }
    }
}

/// Outcome of parsing one model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionResult {
    /// The image contained no questions. Not an error.
    Empty,
    /// One or more questions, in the order the model returned them.
    Success(Vec<QuestionRecord>),
    /// The response could not be turned into records.
    Failure(ExtractionFailure),
}

impl ExtractionResult {
    /// The extracted records; empty for `Empty` and `Failure`.
    pub fn records(&self) -> &[QuestionRecord] {
        match self {
            ExtractionResult::Success(records) => records,
            ExtractionResult::Empty | ExtractionResult::Failure(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractionResult::Failure(_))
    }

    /// The classified failure, if any.
    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            ExtractionResult::Failure(f) => Some(f),
            _ => None,
        }
    }
}

impl From<Vec<QuestionRecord>> for ExtractionResult {
    fn from(records: Vec<QuestionRecord>) -> Self {
        if records.is_empty() {
            ExtractionResult::Empty
        } else {
            ExtractionResult::Success(records)
        }
    }
}
