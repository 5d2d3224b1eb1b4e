//! Payload-to-text extraction helpers.
//!
//! PDF is not a distinct agent — it is a pre-step that reduces the payload
//! to text, which then flows through the same extraction path as email and
//! plain text.

use crate::error::ExtractError;

/// Extract text from PDF bytes.
pub fn pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strict UTF-8 view of a payload.
pub fn utf8_text(bytes: &[u8]) -> Result<&str, ExtractError> {
    std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)
}
