//! Instruction texts sent to the extraction and advisory services.
//!
//! Every prompt lives here so that changing extraction behaviour means editing
//! exactly one place, and so tests can inspect prompts without a live model.

use crate::config::OutputKind;
use crate::error::TaskFailure;

/// Instruction for [`OutputKind::TabularBinary`]: a row-oriented JSON array
/// with no surrounding text.
pub const TABULAR_INSTRUCTION: &str = "Extract all data from this PDF. \
Return ONLY a JSON array of objects where each object represents a row. \
If there are multiple tables, merge them into one list. \
Do not include markdown formatting or extra text.";

/// Instruction for [`OutputKind::DocumentBinary`]: a clean document body.
pub const DOCUMENT_INSTRUCTION: &str = "Convert this document to a structured \
text format suitable for professional use. Preserve headings, paragraphs and \
list structure. Output only the document body, without commentary.";

/// System message reinforcing the response encoding for structured output.
pub const STRUCTURED_RESPONSE_HINT: &str =
    "Respond with a single valid JSON value and nothing else.";

/// Returned by the assistant when the advisory service cannot answer.
pub const ADVISOR_FALLBACK_ANSWER: &str = "I apologize, but I'm having trouble \
processing that request right now. Please try again.";

/// Opening line of the assistant transcript.
pub const ADVISOR_GREETING: &str =
    "Assistant active. How can I assist with your data calibration today?";

/// Select the extraction instruction for an output kind.
pub fn instruction_for(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::TabularBinary => TABULAR_INSTRUCTION,
        OutputKind::DocumentBinary => DOCUMENT_INSTRUCTION,
    }
}

/// Render a failure as the one-line context handed to the advisory service.
pub fn failure_context(failure: &TaskFailure) -> String {
    match failure.detail {
        Some(ref d) => format!("{} — {} ({})", failure.kind, failure.message, d),
        None => format!("{} — {}", failure.kind, failure.message),
    }
}

/// Build the single-turn advisory prompt.
///
/// When a conversion failure is current it is placed ahead of the question so
/// the answer can address it directly.
pub fn advisory_prompt(question: &str, error_context: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are an expert AI assistant specialized in document processing and data conversion.\n",
    );
    if let Some(ctx) = error_context {
        prompt.push_str(&format!(
            "The user's most recent conversion failed with: {ctx}\n"
        ));
    }
    prompt.push_str(&format!("User Question: {question}\n\n"));
    prompt.push_str(
        "Context: The user is using a tool to convert PDFs to Excel/Word. \
Help them with questions about formatting, data extraction, or how to get the \
best results from their PDF documents.\n\nProvide a concise, helpful answer.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn tabular_instruction_demands_bare_json_array() {
        let i = instruction_for(OutputKind::TabularBinary);
        assert!(i.contains("JSON array"));
        assert!(i.contains("Do not include markdown"));
    }

    #[test]
    fn document_instruction_is_distinct() {
        assert_ne!(
            instruction_for(OutputKind::DocumentBinary),
            instruction_for(OutputKind::TabularBinary)
        );
    }

    #[test]
    fn advisory_prompt_places_context_before_question() {
        let p = advisory_prompt("why?", Some("DataParsingError — bad rows"));
        let ctx = p.find("DataParsingError").unwrap();
        let q = p.find("User Question: why?").unwrap();
        assert!(ctx < q);
    }

    #[test]
    fn advisory_prompt_without_context() {
        let p = advisory_prompt("how do I export tables?", None);
        assert!(!p.contains("most recent conversion failed"));
        assert!(p.contains("how do I export tables?"));
    }

    #[test]
    fn failure_context_includes_detail() {
        let f = TaskFailure::new(FailureKind::DataParsingError, "bad rows").with_detail("line 3");
        assert_eq!(failure_context(&f), "DataParsingError — bad rows (line 3)");
    }
}
