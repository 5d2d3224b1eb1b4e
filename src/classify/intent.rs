//! Intent classification strategies.
//!
//! One fixed seam (`IntentClassifier`) with two interchangeable
//! implementations: the keyword/structure heuristics here (fast,
//! deterministic, infallible) and the remote LLM call in
//! [`crate::classify::openrouter`]. The [`Classifier`](crate::classify::Classifier)
//! runs heuristics first and only consults the remote strategy for
//! ambiguous content.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::ClassifierError;
use crate::pipeline::types::{Format, Intent};

/// An intent label plus the strategy's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentGuess {
    pub intent: Intent,
    pub confidence: f32,
}

impl IntentGuess {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The guess used when no strategy produced anything usable.
    pub fn undecided() -> Self {
        Self::new(Intent::General, 0.0)
    }
}

/// Polymorphic intent classification capability.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Strategy name, recorded in `ClassificationResult::classified_by`.
    fn name(&self) -> &'static str;

    /// Classify the content's business intent.
    ///
    /// `text` is the readable view of the payload (PDF already reduced to
    /// text); `format` lets structure-aware strategies inspect JSON shape.
    async fn classify(&self, text: &str, format: Format) -> Result<IntentGuess, ClassifierError>;
}

// ── Keyword strategy ────────────────────────────────────────────────

/// A single lexical cue with a compiled regex.
struct LexicalRule {
    regex: Regex,
    intent: Intent,
    confidence: f32,
}

/// Per-intent field-name cues for JSON payloads.
struct ShapeRule {
    intent: Intent,
    cue_keys: &'static [&'static str],
}

/// Deterministic keyword/structure classifier.
///
/// For JSON payloads it scores top-level field names against per-intent
/// cue sets; for everything else it matches lexical cues in order, first
/// match wins. Infallible — ambiguous content comes back as an undecided
/// guess, not an error.
pub struct KeywordClassifier {
    lexical_rules: Vec<LexicalRule>,
    shape_rules: Vec<ShapeRule>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let lexical_rules = vec![
            LexicalRule {
                regex: Regex::new(r"(?i)\b(invoice|amount due|payment due|remittance|receipt for|billed)\b")
                    .unwrap(),
                intent: Intent::Invoice,
                confidence: 0.85,
            },
            LexicalRule {
                regex: Regex::new(
                    r"(?i)\b(rfq|request for (a )?(quote|quotation|proposal)|quotes?|quotation|tender|procurement)\b",
                )
                .unwrap(),
                intent: Intent::Rfq,
                confidence: 0.85,
            },
            LexicalRule {
                regex: Regex::new(
                    r"(?i)\b(complaint|refund|defective|dissatisfied|unacceptable|not working|very disappointed)\b",
                )
                .unwrap(),
                intent: Intent::Complaint,
                confidence: 0.85,
            },
            LexicalRule {
                regex: Regex::new(
                    r"(?i)\b(regulation|regulatory|compliance|gdpr|hipaa|statute|directive|legal notice)\b",
                )
                .unwrap(),
                intent: Intent::Regulation,
                confidence: 0.8,
            },
        ];

        let shape_rules = vec![
            ShapeRule {
                intent: Intent::Invoice,
                cue_keys: &["invoice_number", "invoice_id", "amount", "vendor", "due_date", "tax_amount"],
            },
            ShapeRule {
                intent: Intent::Rfq,
                cue_keys: &["rfq_number", "deadline", "specifications", "budget_range", "contact"],
            },
            ShapeRule {
                intent: Intent::Complaint,
                cue_keys: &["issue_type", "severity", "customer_id", "product_id", "date_occurred"],
            },
        ];

        Self {
            lexical_rules,
            shape_rules,
        }
    }

    /// Score a parsed JSON object's top-level keys against the shape rules.
    ///
    /// A declared `document_type`/`type` field that names an intent wins
    /// outright; otherwise two or more cue-key hits are required to claim.
    fn classify_json(&self, text: &str) -> Option<IntentGuess> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let obj = value.as_object()?;

        if let Some(declared) = obj
            .get("document_type")
            .or_else(|| obj.get("type"))
            .and_then(|v| v.as_str())
            .and_then(Intent::parse_label)
        {
            return Some(IntentGuess::new(declared, 0.95));
        }

        let keys: Vec<String> = obj.keys().map(|k| k.to_ascii_lowercase()).collect();
        let mut best: Option<(Intent, usize)> = None;
        for rule in &self.shape_rules {
            let hits = rule
                .cue_keys
                .iter()
                .filter(|cue| keys.iter().any(|k| k == *cue))
                .count();
            if hits >= 2 && best.map(|(_, b)| hits > b).unwrap_or(true) {
                best = Some((rule.intent, hits));
            }
        }

        best.map(|(intent, hits)| IntentGuess::new(intent, 0.5 + 0.15 * hits as f32))
    }

    /// First lexical rule that matches wins.
    fn classify_text(&self, text: &str) -> Option<IntentGuess> {
        for rule in &self.lexical_rules {
            if rule.regex.is_match(text) {
                return Some(IntentGuess::new(rule.intent, rule.confidence));
            }
        }
        None
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, text: &str, format: Format) -> Result<IntentGuess, ClassifierError> {
        let guess = match format {
            Format::Json => self
                .classify_json(text)
                .or_else(|| self.classify_text(text)),
            _ => self.classify_text(text),
        };

        match guess {
            Some(g) => {
                debug!(intent = g.intent.as_str(), confidence = g.confidence, "Keyword match");
                Ok(g)
            }
            None => Ok(IntentGuess::undecided()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn classify(text: &str, format: Format) -> IntentGuess {
        KeywordClassifier::new().classify(text, format).await.unwrap()
    }

    #[tokio::test]
    async fn invoice_keyword_in_text() {
        let g = classify("Please find the invoice attached.", Format::Text).await;
        assert_eq!(g.intent, Intent::Invoice);
        assert!(g.confidence > 0.7);
    }

    #[tokio::test]
    async fn rfq_keyword_in_email() {
        let g = classify("URGENT: please quote ASAP for 50 chairs", Format::Email).await;
        assert_eq!(g.intent, Intent::Rfq);
    }

    #[tokio::test]
    async fn complaint_keyword() {
        let g = classify("I want a refund, the unit arrived defective.", Format::Text).await;
        assert_eq!(g.intent, Intent::Complaint);
    }

    #[tokio::test]
    async fn regulation_keyword() {
        let g = classify("New GDPR compliance requirements take effect in May.", Format::Text).await;
        assert_eq!(g.intent, Intent::Regulation);
    }

    #[tokio::test]
    async fn ambiguous_text_is_undecided() {
        let g = classify("See you at lunch on Thursday.", Format::Text).await;
        assert_eq!(g.intent, Intent::General);
        assert_eq!(g.confidence, 0.0);
    }

    #[tokio::test]
    async fn json_shape_scores_invoice() {
        let payload = r#"{"amount": 1250.0, "vendor": "Tech Solutions Inc", "items": [], "date": "2024-01-15"}"#;
        let g = classify(payload, Format::Json).await;
        assert_eq!(g.intent, Intent::Invoice);
        assert!(g.confidence >= 0.7, "confidence was {}", g.confidence);
    }

    #[tokio::test]
    async fn json_shape_scores_complaint() {
        let payload = r#"{"issue_type": "billing", "description": "double charge", "severity": "high"}"#;
        let g = classify(payload, Format::Json).await;
        assert_eq!(g.intent, Intent::Complaint);
    }

    #[tokio::test]
    async fn json_declared_document_type_wins() {
        let payload = r#"{"document_type": "rfq", "free_text": "whatever"}"#;
        let g = classify(payload, Format::Json).await;
        assert_eq!(g.intent, Intent::Rfq);
        assert!(g.confidence >= 0.9);
    }

    #[tokio::test]
    async fn json_single_cue_key_is_not_enough() {
        let payload = r#"{"amount": 3, "name": "widget"}"#;
        let g = classify(payload, Format::Json).await;
        assert_eq!(g.intent, Intent::General);
    }

    #[tokio::test]
    async fn json_falls_back_to_lexical_cues() {
        let payload = r#"{"note": "this invoice covers March services", "total": 12}"#;
        let g = classify(payload, Format::Json).await;
        assert_eq!(g.intent, Intent::Invoice);
    }

    #[tokio::test]
    async fn first_lexical_match_wins() {
        // Contains both invoice and quote cues; invoice rule is checked first.
        let g = classify("invoice attached, also send a quote", Format::Text).await;
        assert_eq!(g.intent, Intent::Invoice);
    }
}
