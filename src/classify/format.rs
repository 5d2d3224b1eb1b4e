//! Structural format detection — cheap checks, no network.
//!
//! Order matters: PDF magic bytes, then a JSON parse attempt, then
//! email header patterns, then plain text. Filename hints only break
//! ties that the payload itself can't settle.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::{Format, InputDocument};

/// `From:` / `Subject:` style header line at the start of a line.
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(from|to|subject|date|reply-to|message-id):\s").unwrap()
});

/// Detect the structural format of a document.
pub fn detect_format(doc: &InputDocument) -> Format {
    // PDF magic bytes win over everything, including a .json hint.
    if doc.payload.starts_with(b"%PDF-") {
        return Format::Pdf;
    }
    if doc.extension().as_deref() == Some("pdf") {
        return Format::Pdf;
    }

    let text = doc.text_lossy();
    let trimmed = text.trim_start();

    // A payload that parses as a JSON object/array is JSON regardless of hint.
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Format::Json;
    }
    if doc.extension().as_deref() == Some("json")
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Format::Json;
    }

    // Header-structured content is email even when the hint says .txt.
    if is_email_like(&text) || doc.extension().as_deref() == Some("eml") {
        return Format::Email;
    }

    Format::Text
}

/// Does this look like an RFC-822-style message?
///
/// Requires at least two header lines in the first chunk so a lone
/// "From: the desk of..." opener in prose doesn't misfire.
fn is_email_like(text: &str) -> bool {
    let head: String = text.lines().take(20).collect::<Vec<_>>().join("\n");
    HEADER_LINE.find_iter(&head).count() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, name: Option<&str>) -> InputDocument {
        InputDocument::from_text(text, name.map(String::from), None)
    }

    #[test]
    fn detects_pdf_magic_bytes() {
        let d = InputDocument::from_bytes(b"%PDF-1.7\n...".to_vec(), None, None);
        assert_eq!(detect_format(&d), Format::Pdf);
    }

    #[test]
    fn detects_pdf_by_extension() {
        let d = doc("binary-ish content", Some("scan.pdf"));
        assert_eq!(detect_format(&d), Format::Pdf);
    }

    #[test]
    fn pdf_magic_beats_json_hint() {
        let d = InputDocument::from_bytes(
            b"%PDF-1.4".to_vec(),
            Some("mislabeled.json".into()),
            None,
        );
        assert_eq!(detect_format(&d), Format::Pdf);
    }

    #[test]
    fn detects_json_object() {
        let d = doc(r#"{"amount": 12.5, "vendor": "Acme"}"#, None);
        assert_eq!(detect_format(&d), Format::Json);
    }

    #[test]
    fn detects_json_array() {
        let d = doc(r#"[1, 2, 3]"#, None);
        assert_eq!(detect_format(&d), Format::Json);
    }

    #[test]
    fn invalid_json_with_brace_is_text() {
        let d = doc("{not json at all", None);
        assert_eq!(detect_format(&d), Format::Text);
    }

    #[test]
    fn detects_email_headers() {
        let d = doc(
            "From: alice@example.com\nSubject: Quote needed\n\nHello there",
            None,
        );
        assert_eq!(detect_format(&d), Format::Email);
    }

    #[test]
    fn single_header_line_is_not_email() {
        let d = doc("From: the desk of the CEO\n\nA memo about things.", None);
        assert_eq!(detect_format(&d), Format::Text);
    }

    #[test]
    fn eml_extension_forces_email() {
        let d = doc("just a body with no headers", Some("message.eml"));
        assert_eq!(detect_format(&d), Format::Email);
    }

    #[test]
    fn email_headers_beat_txt_hint() {
        let d = doc(
            "From: bob@x.com\nTo: sales@y.com\nSubject: RFQ\n\nbody",
            Some("pasted.txt"),
        );
        assert_eq!(detect_format(&d), Format::Email);
    }

    #[test]
    fn plain_prose_is_text() {
        let d = doc("Quarterly report attached for your review.", None);
        assert_eq!(detect_format(&d), Format::Text);
    }
}
