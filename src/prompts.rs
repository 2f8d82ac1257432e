//! Prompts for spreadsheet extraction.
//!
//! Callers can override both strings through
//! [`crate::config::ExtractionConfig`]; these constants are the defaults.

/// Default system message: "You are an assistant who helps."
pub const DEFAULT_SYSTEM_PROMPT: &str = "당신은 도움을 주는 어시스턴트입니다.";

/// Default instruction: "Extract key-value pairs as JSON."
pub const DEFAULT_INSTRUCTION: &str = "키-값 쌍으로 JSON 뽑아줘";

/// Build the user message for one cell: the instruction, a blank line, the
/// `원문:` ("source text") label, then the cell text.
pub fn cell_prompt(instruction: &str, source_text: &str) -> String {
    format!("{instruction}\n\n원문:\n{source_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_prompt_layout() {
        let p = cell_prompt("Extract JSON", "name: Kim");
        assert_eq!(p, "Extract JSON\n\n원문:\nname: Kim");
    }

    #[test]
    fn test_default_prompt_uses_default_instruction() {
        assert!(cell_prompt(DEFAULT_INSTRUCTION, "x").starts_with(DEFAULT_INSTRUCTION));
    }
}
