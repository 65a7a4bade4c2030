//! Response decoding: raw service text → validated `RecordSet` or text body.
//!
//! Models are told to answer with a bare JSON array, but they regularly wrap
//! it in a ```` ```json ```` fence anyway. Exactly that one convention is
//! undone here: a leading fence line and a trailing fence line. Anything else
//! goes to the JSON parser as-is and fails there with the parser's message.

use crate::config::OutputKind;
use crate::error::{DecodeError, FailureKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One decoded row: column name → scalar value, in the row's own key order.
pub type Record = Map<String, Value>;

/// Ordered rows plus the union of their columns in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl RecordSet {
    /// Build from rows, deriving the column order.
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let columns = {
            let mut seen = HashSet::new();
            let mut columns = Vec::new();
            for row in &rows {
                for key in row.keys() {
                    if seen.insert(key.as_str()) {
                        columns.push(key.clone());
                    }
                }
            }
            columns
        };
        Self { columns, rows }
    }

    /// Validate a parsed JSON value as a row sequence.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(DecodeError::NotASequence {
                    found: json_kind(&other),
                })
            }
        };

        let rows = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(DecodeError::RowNotAMapping {
                    row: i + 1,
                    found: json_kind(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_rows(rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A decoded response, shaped by the task's output kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Records(RecordSet),
    Body(String),
}

/// Decode `raw` into the shape `kind` expects.
pub fn decode(kind: OutputKind, raw: &str) -> Result<Decoded, DecodeError> {
    match kind {
        OutputKind::TabularBinary => decode_tabular(raw).map(Decoded::Records),
        OutputKind::DocumentBinary => decode_document_body(raw).map(Decoded::Body),
    }
}

/// Decode a tabular response into a [`RecordSet`].
///
/// Empty input, invalid JSON, a non-array top-level value or a non-object row
/// all fail with [`FailureKind::DataParsingError`].
pub fn decode_tabular(raw: &str) -> Result<RecordSet, DecodeError> {
    let body = strip_fence(raw);
    if body.trim().is_empty() {
        return Err(DecodeError::Empty {
            kind: FailureKind::DataParsingError,
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| DecodeError::Parse {
        detail: e.to_string(),
    })?;

    RecordSet::from_value(value)
}

/// Accept any non-blank text verbatim as a document body.
pub fn decode_document_body(raw: &str) -> Result<String, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::Empty {
            kind: FailureKind::EmptyResponse,
        });
    }
    Ok(raw.to_string())
}

// ── Fence stripping ──────────────────────────────────────────────────────

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[^\n]*\n(.*?)\n?[ \t]*```$").unwrap());

/// Remove one layer of markdown code fencing, if present.
///
/// A response that opens with a fence but never closes it loses only its
/// opening line.
pub fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    if let Some(caps) = RE_FENCED.captures(trimmed) {
        if let Some(body) = caps.get(1) {
            return body.as_str();
        }
    }
    match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => trimmed,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_plain_array() {
        let rs = decode_tabular(r#"[{"a":1,"b":2},{"a":3}]"#).unwrap();
        assert_eq!(rs.columns(), ["a", "b"]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows()[1].get("b"), None);
    }

    #[test]
    fn fenced_and_unfenced_decode_identically() {
        let bare = r#"[{"name":"Ada","age":36},{"name":"Alan","city":"London"}]"#;
        let fenced = format!("```json\n{bare}\n```");
        let untagged = format!("```\n{bare}\n```\n");
        let expected = decode_tabular(bare).unwrap();
        assert_eq!(decode_tabular(&fenced).unwrap(), expected);
        assert_eq!(decode_tabular(&untagged).unwrap(), expected);
    }

    #[test]
    fn columns_follow_first_seen_order() {
        let rs = decode_tabular(r#"[{"z":1,"a":2},{"m":3,"z":4}]"#).unwrap();
        assert_eq!(rs.columns(), ["z", "a", "m"]);
    }

    #[test]
    fn empty_inputs_are_parsing_errors() {
        for raw in ["", "   \n", "```json\n```"] {
            let err = decode_tabular(raw).unwrap_err();
            assert_eq!(err.kind(), FailureKind::DataParsingError, "input {raw:?}");
        }
    }

    #[test]
    fn invalid_json_carries_parser_detail() {
        let err = decode_tabular("[{\"a\": 1,]").unwrap_err();
        match err {
            DecodeError::Parse { detail } => assert!(detail.contains("line 1")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn top_level_object_is_rejected() {
        let err = decode_tabular(r#"{"rows":[]}"#).unwrap_err();
        assert_eq!(err, DecodeError::NotASequence { found: "object" });
    }

    #[test]
    fn non_object_row_is_rejected() {
        let err = decode_tabular(r#"[{"a":1}, 5]"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::RowNotAMapping {
                row: 2,
                found: "number"
            }
        );
    }

    #[test]
    fn empty_array_is_a_valid_record_set() {
        let rs = decode_tabular("[]").unwrap();
        assert!(rs.is_empty());
        assert!(rs.columns().is_empty());
    }

    #[test]
    fn unterminated_fence_drops_only_opening_line() {
        assert_eq!(strip_fence("```json\n[1]"), "[1]");
    }

    #[test]
    fn fence_in_the_middle_is_left_alone() {
        let raw = "[{\"code\":\"```\"}]";
        assert_eq!(strip_fence(raw), raw);
    }

    #[test]
    fn document_body_is_verbatim() {
        let body = "# Title\n\nSome text  ";
        assert_eq!(decode_document_body(body).unwrap(), body);
    }

    #[test]
    fn blank_document_body_is_empty_response() {
        let err = decode_document_body("  \n").unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyResponse);
    }

    #[test]
    fn decode_dispatches_on_output_kind() {
        let raw = "[{\"a\":1}]";
        assert!(matches!(
            decode(OutputKind::TabularBinary, raw),
            Ok(Decoded::Records(_))
        ));
        assert_eq!(
            decode(OutputKind::DocumentBinary, raw),
            Ok(Decoded::Body(raw.to_string()))
        );
    }

    #[test]
    fn from_value_preserves_scalars() {
        let rs = RecordSet::from_value(json!([{"n": 1.5, "ok": true, "s": "x"}])).unwrap();
        assert_eq!(rs.rows()[0]["n"], json!(1.5));
        assert_eq!(rs.rows()[0]["ok"], json!(true));
    }
}
