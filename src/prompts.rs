//! The extraction instruction sent alongside every image.
//!
//! The text below is a contract with the model: it pins the response to a
//! bare JSON array of `{"question", "options"}` objects. The validation rules
//! in [`crate::pipeline::parse`] accept exactly this shape, so any change to
//! the requested output must be made in both places together.

/// Instruction asking the VLM for a JSON array of question/options objects.
pub const EXTRACTION_INSTRUCTION: &str = r#"Critically analyze the provided image to identify all multiple-choice questions and their corresponding options.
Your response MUST be a single, valid JSON array. Each element in the array MUST be a JSON object representing one question.
Each JSON object MUST contain exactly two keys:
1. "question": A string representing the full text of the question.
2. "options": An array of strings, where each string is an individual answer choice. Do NOT include any prefixes (e.g., 'a)', '1.') in these option strings.
Example output for two questions:
[
    {"question": "What is the capital of France?", "options": ["Berlin", "Paris", "Rome", "Madrid"]},
    {"question": "Which planet is known as the Red Planet?", "options": ["Earth", "Mars", "Jupiter", "Venus"]}
]
If no questions are found, return an empty array [].
ABSOLUTELY NO other text, explanations, or markdown formatting should precede or follow this JSON array."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_both_keys() {
        assert!(EXTRACTION_INSTRUCTION.contains("\"question\""));
        assert!(EXTRACTION_INSTRUCTION.contains("\"options\""));
    }

    #[test]
    fn instruction_covers_empty_case() {
        assert!(EXTRACTION_INSTRUCTION.contains("return an empty array []"));
    }

    #[test]
    fn instruction_example_is_valid_array() {
        let start = EXTRACTION_INSTRUCTION.find("[\n").unwrap();
        let end = EXTRACTION_INSTRUCTION.find("\n]").unwrap() + 2;
        let example = &EXTRACTION_INSTRUCTION[start..end];
        let value: serde_json::Value = serde_json::from_str(example).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
