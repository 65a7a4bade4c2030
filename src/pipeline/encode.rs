//! Artifact encoding: `RecordSet` → `.xlsx`, text body → `.doc`.
//!
//! The workbook is the smallest valid SpreadsheetML package: content types,
//! one relationship to the workbook, one sheet named `ExtractedData`. Row 1
//! holds the column names; each record becomes one row below it. Strings use
//! inline cells, so no shared-strings part is needed. Absent or `null` values
//! produce no `<c>` element, which spreadsheet readers show as an empty cell.
//!
//! Entry timestamps are pinned to the ZIP epoch so identical input always
//! yields identical bytes.
//!
//! The `.doc` artifact is a Word-compatible HTML container: Word, LibreOffice
//! and Pages all open it as a document, one paragraph per source line.

use crate::error::EncodeError;
use crate::pipeline::decode::{Decoded, RecordSet};
use serde_json::Value;
use std::borrow::Cow;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "ExtractedData";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Encoded artifact bytes plus the table dimensions that were written.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub record_count: Option<usize>,
    pub column_count: Option<usize>,
}

/// Encode whichever shape the decoder produced.
pub fn encode(decoded: &Decoded) -> Result<Encoded, EncodeError> {
    match decoded {
        Decoded::Records(records) => Ok(Encoded {
            bytes: encode_tabular(records)?,
            record_count: Some(records.len()),
            column_count: Some(records.columns().len()),
        }),
        Decoded::Body(text) => Ok(Encoded {
            bytes: encode_document(text),
            record_count: None,
            column_count: None,
        }),
    }
}

/// Build a single-sheet `.xlsx` workbook from a record set.
pub fn encode_tabular(records: &RecordSet) -> Result<Vec<u8>, EncodeError> {
    let workbook = workbook_xml();
    let sheet = worksheet_xml(records);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("xl/workbook.xml", &workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/worksheets/sheet1.xml", &sheet),
    ];

    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(
        "Encoded workbook: {} rows × {} columns → {} bytes",
        records.len(),
        records.columns().len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Wrap a text body in a Word-compatible HTML container.
pub fn encode_document(text: &str) -> Vec<u8> {
    let mut html = String::with_capacity(text.len() + 512);
    html.push_str(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
xmlns:w=\"urn:schemas-microsoft-com:office:word\" \
xmlns=\"http://www.w3.org/TR/REC-html40\">\n\
<head><meta charset=\"utf-8\"><title>Converted document</title></head>\n<body>\n",
    );
    for line in text.lines() {
        html.push_str("<p>");
        html.push_str(&escape_xml(line));
        html.push_str("</p>\n");
    }
    html.push_str("</body>\n</html>\n");
    html.into_bytes()
}

// ── Sheet XML ────────────────────────────────────────────────────────────

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
}

fn worksheet_xml(records: &RecordSet) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );

    if !records.columns().is_empty() {
        xml.push_str("<row r=\"1\">");
        for (col, name) in records.columns().iter().enumerate() {
            push_string_cell(&mut xml, &cell_ref(col, 1), name);
        }
        xml.push_str("</row>");
    }

    for (i, record) in records.rows().iter().enumerate() {
        let row_num = i + 2;
        xml.push_str(&format!("<row r=\"{row_num}\">"));
        for (col, name) in records.columns().iter().enumerate() {
            if let Some(value) = record.get(name) {
                push_value_cell(&mut xml, &cell_ref(col, row_num), value);
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_value_cell(xml: &mut String, at: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            xml.push_str(&format!("<c r=\"{at}\" t=\"b\"><v>{}</v></c>", u8::from(*b)));
        }
        Value::Number(n) => {
            xml.push_str(&format!("<c r=\"{at}\"><v>{n}</v></c>"));
        }
        Value::String(s) => push_string_cell(xml, at, s),
        nested => push_string_cell(xml, at, &nested.to_string()),
    }
}

fn push_string_cell(xml: &mut String, at: &str, text: &str) {
    xml.push_str(&format!(
        "<c r=\"{at}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
        escape_xml(text)
    ));
}

/// A1-style reference for a 0-based column and 1-based row.
pub fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{row}", column_name(col))
}

/// Spreadsheet column letters for a 0-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Escape markup characters and drop control characters XML 1.0 forbids.
fn escape_xml(s: &str) -> Cow<'_, str> {
    let needs_work = s
        .chars()
        .any(|c| matches!(c, '&' | '<' | '>' | '"' | '\'') || is_forbidden_control(c));
    if !needs_work {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_forbidden_control(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_forbidden_control(c: char) -> bool {
    c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::decode_tabular;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        let mut part = archive.by_name(name).expect("part present");
        let mut s = String::new();
        part.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
        assert_eq!(cell_ref(1, 3), "B3");
    }

    #[test]
    fn missing_key_renders_as_empty_cell() {
        let records = decode_tabular(r#"[{"a":1,"b":2},{"a":3}]"#).unwrap();
        let bytes = encode_tabular(&records).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">a</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B1" t="inlineStr"><is><t xml:space="preserve">b</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="A2"><v>1</v></c>"#));
        assert!(sheet.contains(r#"<c r="B2"><v>2</v></c>"#));
        assert!(sheet.contains(r#"<c r="A3"><v>3</v></c>"#));
        assert!(!sheet.contains(r#"r="B3""#));
        assert_eq!(sheet.matches("<row ").count(), 3);
    }

    #[test]
    fn workbook_has_required_parts() {
        let bytes = encode_tabular(&RecordSet::default()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/_rels/workbook.xml.rels",
                "xl/workbook.xml",
                "xl/worksheets/sheet1.xml",
            ]
        );
        assert!(read_part(&bytes, "xl/workbook.xml").contains(SHEET_NAME));
    }

    #[test]
    fn encoding_is_deterministic() {
        let records = decode_tabular(r#"[{"x":"y"}]"#).unwrap();
        assert_eq!(
            encode_tabular(&records).unwrap(),
            encode_tabular(&records).unwrap()
        );
    }

    #[test]
    fn scalar_types_map_to_cell_types() {
        let records =
            decode_tabular(r#"[{"s":"a<b","n":2.5,"t":true,"z":null,"o":{"k":1}}]"#).unwrap();
        let sheet = read_part(&encode_tabular(&records).unwrap(), "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("a&lt;b"));
        assert!(sheet.contains(r#"<c r="B2"><v>2.5</v></c>"#));
        assert!(sheet.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));
        assert!(!sheet.contains(r#"r="D2""#));
        assert!(sheet.contains("{&quot;k&quot;:1}"));
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(escape_xml("a\u{0}b\u{1b}c\td"), "abc\td");
    }

    #[test]
    fn document_wraps_each_line_in_a_paragraph() {
        let doc = String::from_utf8(encode_document("Title\nA & B")).unwrap();
        assert!(doc.starts_with("<html"));
        assert!(doc.contains("<p>Title</p>"));
        assert!(doc.contains("<p>A &amp; B</p>"));
        assert!(doc.contains("urn:schemas-microsoft-com:office:word"));
    }

    #[test]
    fn encode_reports_dimensions() {
        let records = decode_tabular(r#"[{"a":1,"b":2},{"a":3}]"#).unwrap();
        let encoded = encode(&Decoded::Records(records)).unwrap();
        assert_eq!(encoded.record_count, Some(2));
        assert_eq!(encoded.column_count, Some(2));

        let encoded = encode(&Decoded::Body("x".into())).unwrap();
        assert_eq!(encoded.record_count, None);
    }
}
