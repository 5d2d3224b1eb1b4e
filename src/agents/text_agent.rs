//! Text agent — extraction for email, plain text, and PDF documents.
//!
//! Emails are parsed with `mail-parser`; a header line scan covers
//! pasted header-style text that is not RFC 5322 compliant. PDFs run
//! through the text-extraction pre-step first, so by the time fields
//! are pulled the payload is plain text either way.

use async_trait::async_trait;
use mail_parser::MessageParser;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::agents::Agent;
use crate::pipeline::types::{
    AgentKind, Anomaly, ClassificationResult, ExtractionResult, Format, InputDocument, Intent,
    Urgency,
};

/// Longest body excerpt stored verbatim; longer bodies keep a preview.
const BODY_PREVIEW_CHARS: usize = 2000;

/// Agent for text-shaped payloads (email, plain text, extracted PDF).
pub struct TextAgent;

impl TextAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TextAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Text
    }

    async fn extract(
        &self,
        doc: &InputDocument,
        classification: &ClassificationResult,
    ) -> ExtractionResult {
        let mut result = ExtractionResult::new(self.kind());
        let mut confidence: f32 = 1.0;

        // PDF pre-step: the agent itself only ever sees text.
        let text = match classification.format {
            Format::Pdf => match crate::extract::pdf_text(&doc.payload) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "PDF text extraction failed");
                    result.push_anomaly(Anomaly::UnreadableInput {
                        reason: format!("PDF text extraction failed: {e}"),
                    });
                    confidence = 0.2;
                    doc.text_lossy()
                }
            },
            _ => doc.text_lossy(),
        };

        let parsed = parse_message(&text);
        if !parsed.headers_found && classification.format == Format::Email {
            confidence = confidence.min(0.7);
        }

        match &parsed.sender {
            Some(sender) => result.set_field("sender", json!(sender)),
            None if classification.format == Format::Email => {
                result.push_anomaly(Anomaly::MissingField { field: "sender".into() });
            }
            None => {}
        }
        match &parsed.subject {
            Some(subject) => result.set_field("subject", json!(subject)),
            None if classification.format == Format::Email => {
                result.push_anomaly(Anomaly::MissingField { field: "subject".into() });
            }
            None => {}
        }
        if let Some(date) = &parsed.date {
            result.set_field("date", json!(date));
        }

        let urgency = assess_urgency(&text);
        result.set_field("urgency", json!(urgency.as_str()));
        result.set_field("body", body_field(&parsed.body));

        // Action-oriented intents get key points and action items too.
        if matches!(
            classification.intent,
            Intent::Rfq | Intent::Complaint | Intent::Regulation
        ) {
            let key_points = key_points(&parsed.body);
            if !key_points.is_empty() {
                result.set_field("key_points", json!(key_points));
            }
            let action_items = action_items(&parsed.body);
            if !action_items.is_empty() {
                result.set_field("action_items", json!(action_items));
            }
        }

        debug!(
            format = classification.format.as_str(),
            intent = classification.intent.as_str(),
            urgency = urgency.as_str(),
            headers_found = parsed.headers_found,
            "Text extraction complete"
        );

        confidence -= 0.1 * result.anomalies.len() as f32;
        result.with_confidence(confidence.max(0.1))
    }
}

// ── Message parsing ─────────────────────────────────────────────────

struct ParsedMessage {
    sender: Option<String>,
    subject: Option<String>,
    date: Option<String>,
    body: String,
    /// Whether any headers were recognized at all.
    headers_found: bool,
}

/// Parse an email or header-style text into sender/subject/body.
///
/// `mail-parser` handles real RFC 5322 messages; the manual line scan
/// picks up `From:`/`Subject:` lines in pasted text it rejects.
fn parse_message(text: &str) -> ParsedMessage {
    if let Some(parsed) = MessageParser::default().parse(text.as_bytes()) {
        let sender = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string());
        let subject = parsed.subject().map(|s| s.to_string());
        let date = parsed.date().map(|d| d.to_rfc3339());
        if sender.is_some() || subject.is_some() {
            let body = parsed
                .body_text(0)
                .map(|b| b.trim().to_string())
                .unwrap_or_default();
            return ParsedMessage {
                sender,
                subject,
                date,
                body,
                headers_found: true,
            };
        }
    }
    scan_header_lines(text)
}

/// Line-scan fallback: headers in the first lines, body after the first
/// blank line.
fn scan_header_lines(text: &str) -> ParsedMessage {
    let mut sender = None;
    let mut subject = None;
    let mut date = None;
    let mut body_start = 0;

    for (i, line) in text.lines().take(10).enumerate() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.to_ascii_lowercase().as_str() {
            "from" => sender = Some(value.to_string()),
            "subject" => subject = Some(value.to_string()),
            "date" => date = Some(value.to_string()),
            _ => continue,
        }
        body_start = i + 1;
    }

    let headers_found = sender.is_some() || subject.is_some() || date.is_some();
    let body = if headers_found {
        let after_headers: Vec<&str> = text.lines().skip(body_start).collect();
        after_headers.join("\n").trim().to_string()
    } else {
        text.trim().to_string()
    };

    ParsedMessage {
        sender,
        subject,
        date,
        body,
        headers_found,
    }
}

fn body_field(body: &str) -> Value {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        json!(body)
    } else {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        json!(format!("{preview}…"))
    }
}

// ── Content analysis ────────────────────────────────────────────────

/// Lexical urgency cues, checked high → low. No cue means medium.
fn assess_urgency(text: &str) -> Urgency {
    const HIGH: &[&str] = &[
        "urgent",
        "asap",
        "immediately",
        "emergency",
        "critical",
        "deadline",
    ];
    const LOW: &[&str] = &["when possible", "no rush", "fyi", "whenever"];
    const MEDIUM: &[&str] = &["soon", "priority", "important", "needed", "required"];

    let lower = text.to_lowercase();
    if HIGH.iter().any(|cue| lower.contains(cue)) {
        Urgency::High
    } else if LOW.iter().any(|cue| lower.contains(cue)) {
        Urgency::Low
    } else if MEDIUM.iter().any(|cue| lower.contains(cue)) {
        Urgency::Medium
    } else {
        Urgency::Medium
    }
}

/// Bulleted or numbered lines, stripped of the bullet.
fn key_points(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let stripped = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .or_else(|| trimmed.strip_prefix("• "))
                .or_else(|| {
                    trimmed
                        .split_once(". ")
                        .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty())
                        .map(|(_, rest)| rest)
                })?;
            Some(stripped.trim().to_string())
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Sentences that read as requests or obligations.
fn action_items(body: &str) -> Vec<String> {
    const CUES: &[&str] = &[
        "please",
        "must",
        "need to",
        "submit",
        "provide",
        "send",
        "respond",
        "comply",
    ];
    body.split(['.', '\n'])
        .map(str::trim)
        .filter(|sentence| {
            !sentence.is_empty() && {
                let lower = sentence.to_lowercase();
                CUES.iter().any(|cue| lower.contains(cue))
            }
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(format: Format, intent: Intent) -> ClassificationResult {
        ClassificationResult::new(format, intent, 0.9, "keyword")
    }

    async fn run(text: &str, format: Format, intent: Intent) -> ExtractionResult {
        let doc = InputDocument::from_text(text, None, None);
        TextAgent::new()
            .extract(&doc, &classification(format, intent))
            .await
    }

    #[tokio::test]
    async fn urgent_rfq_email_is_fully_extracted() {
        let email = "From: buyer@example.com\n\
                     To: sales@example.com\n\
                     Subject: URGENT: please quote ASAP\n\
                     \n\
                     We need 100 units of part X-42.\n\
                     Please provide pricing by Friday.";
        let result = run(email, Format::Email, Intent::Rfq).await;
        assert_eq!(result.fields["sender"], "buyer@example.com");
        assert_eq!(result.fields["subject"], "URGENT: please quote ASAP");
        assert_eq!(result.fields["urgency"], "high");
        assert!(result.anomalies.is_empty(), "anomalies: {:?}", result.anomalies);
        let items = result.fields["action_items"].as_array().unwrap();
        assert!(items.iter().any(|i| i.as_str().unwrap().contains("pricing")));
    }

    #[tokio::test]
    async fn missing_headers_are_anomalies_for_email_format() {
        let result = run("just some words with no headers", Format::Email, Intent::General).await;
        let flagged: Vec<_> = result.anomalies.iter().filter_map(Anomaly::field).collect();
        assert_eq!(flagged, vec!["sender", "subject"]);
        assert!(result.confidence < 0.7 + f32::EPSILON);
    }

    #[tokio::test]
    async fn plain_text_has_no_header_anomalies() {
        let result = run("a note to self about groceries", Format::Text, Intent::General).await;
        assert!(result.anomalies.is_empty());
        assert!(!result.fields.contains_key("sender"));
        assert_eq!(result.fields["body"], "a note to self about groceries");
    }

    #[tokio::test]
    async fn header_line_scan_handles_pasted_text() {
        let text = "From: ops@example.com\nSubject: Weekly digest\n\nAll systems nominal.";
        let result = run(text, Format::Email, Intent::General).await;
        assert_eq!(result.fields["sender"], "ops@example.com");
        assert_eq!(result.fields["subject"], "Weekly digest");
        assert!(
            result.fields["body"].as_str().unwrap().contains("All systems nominal"),
            "body: {}",
            result.fields["body"]
        );
    }

    #[tokio::test]
    async fn complaint_gets_key_points_and_action_items() {
        let text = "Subject: Complaint about order 991\n\
                    \n\
                    The unit arrived defective.\n\
                    - screen cracked\n\
                    - battery missing\n\
                    You must send a replacement.";
        let result = run(text, Format::Email, Intent::Complaint).await;
        let points = result.fields["key_points"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], "screen cracked");
        let items = result.fields["action_items"].as_array().unwrap();
        assert!(items.iter().any(|i| i.as_str().unwrap().contains("replacement")));
    }

    #[tokio::test]
    async fn general_intent_skips_analysis_fields() {
        let text = "From: a@b.c\nSubject: hi\n\n- a bullet\nPlease reply.";
        let result = run(text, Format::Email, Intent::General).await;
        assert!(!result.fields.contains_key("key_points"));
        assert!(!result.fields.contains_key("action_items"));
    }

    #[tokio::test]
    async fn unreadable_pdf_degrades_not_fails() {
        let doc = InputDocument::from_bytes(
            b"%PDF-1.4 truncated garbage".to_vec(),
            Some("broken.pdf".into()),
            None,
        );
        let result = TextAgent::new()
            .extract(&doc, &classification(Format::Pdf, Intent::General))
            .await;
        assert!(matches!(result.anomalies[0], Anomaly::UnreadableInput { .. }));
        assert!(result.confidence <= 0.2);
        // Lossy fallback body is still captured.
        assert!(result.fields.contains_key("body"));
    }

    #[tokio::test]
    async fn long_body_is_previewed() {
        let long = "x".repeat(3000);
        let result = run(&long, Format::Text, Intent::General).await;
        let body = result.fields["body"].as_str().unwrap();
        assert!(body.chars().count() <= BODY_PREVIEW_CHARS + 1);
        assert!(body.ends_with('…'));
    }

    #[test]
    fn urgency_cues() {
        assert_eq!(assess_urgency("handle this ASAP"), Urgency::High);
        assert_eq!(assess_urgency("review when possible, no rush"), Urgency::Low);
        assert_eq!(assess_urgency("this is important"), Urgency::Medium);
        assert_eq!(assess_urgency("nothing special here"), Urgency::Medium);
    }

    #[test]
    fn numbered_lists_are_key_points() {
        let points = key_points("1. first thing\n2. second thing\nprose line");
        assert_eq!(points, vec!["first thing", "second thing"]);
    }
}
