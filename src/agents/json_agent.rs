//! JSON agent — schema-guided field extraction for structured payloads.
//!
//! Each intent has an expected shape (required + optional fields). The
//! agent extracts every present field, fuzzy-matching key names when the
//! exact name is absent, and flags missing required fields and malformed
//! amount/date values as anomalies. Extraction always proceeds with
//! whatever is recoverable.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::agents::Agent;
use crate::pipeline::types::{
    AgentKind, Anomaly, ClassificationResult, ExtractionResult, InputDocument, Intent,
};

/// Expected shape of a JSON payload for one intent.
pub struct IntentSchema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// Expected shape for a classified intent.
pub fn schema_for(intent: Intent) -> &'static IntentSchema {
    match intent {
        Intent::Invoice => &IntentSchema {
            required: &["amount", "vendor", "date", "items"],
            optional: &["invoice_number", "due_date", "tax_amount"],
        },
        Intent::Rfq => &IntentSchema {
            required: &["items", "deadline", "contact"],
            optional: &["rfq_number", "specifications", "budget_range"],
        },
        Intent::Complaint => &IntentSchema {
            required: &["issue_type", "description", "severity"],
            optional: &["customer_id", "product_id", "date_occurred"],
        },
        // No required shape for general-purpose documents.
        Intent::Regulation | Intent::General | Intent::Unknown => &IntentSchema {
            required: &[],
            optional: &["type", "description", "metadata"],
        },
    }
}

/// Agent for structured JSON payloads.
pub struct JsonAgent;

impl JsonAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for JsonAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Json
    }

    async fn extract(
        &self,
        doc: &InputDocument,
        classification: &ClassificationResult,
    ) -> ExtractionResult {
        let mut result = ExtractionResult::new(self.kind());

        let text = match crate::extract::utf8_text(&doc.payload) {
            Ok(text) => text,
            Err(e) => {
                result.push_anomaly(Anomaly::UnreadableInput { reason: e.to_string() });
                return result.with_confidence(0.1);
            }
        };

        let value: Value = match serde_json::from_str(text.trim()) {
            Ok(v) => v,
            Err(e) => {
                result.push_anomaly(Anomaly::UnreadableInput {
                    reason: format!("JSON parse error: {e}"),
                });
                return result.with_confidence(0.1);
            }
        };

        let Some(obj) = value.as_object() else {
            // Scalar/array payloads carry no named fields; keep the value
            // and let the schema checks flag what the intent expected.
            result.set_field("payload", value);
            let schema = schema_for(classification.intent);
            for field in schema.required {
                result.push_anomaly(Anomaly::MissingField { field: (*field).into() });
            }
            let confidence = if result.anomalies.is_empty() { 0.7 } else { 0.3 };
            return result.with_confidence(confidence);
        };

        let schema = schema_for(classification.intent);
        let mut missing = 0usize;
        let mut malformed = 0usize;
        // Each source key satisfies at most one schema field. Required
        // fields run first, so they claim their keys before fuzzy
        // matching lets an optional alias ("tax_amount") steal them.
        let mut used: HashSet<String> = HashSet::new();

        for &field in schema.required.iter().chain(schema.optional.iter()) {
            match lookup_field(obj, field, &used) {
                Some((key, found)) => {
                    used.insert(key.to_string());
                    if let Some(reason) = validate_field(field, found) {
                        result.push_anomaly(Anomaly::MalformedField {
                            field: field.into(),
                            reason,
                        });
                        malformed += 1;
                    }
                    result.set_field(field, found.clone());
                }
                None if schema.required.contains(&field) => {
                    result.push_anomaly(Anomaly::MissingField { field: field.into() });
                    missing += 1;
                }
                None => {}
            }
        }

        debug!(
            intent = classification.intent.as_str(),
            extracted = result.fields.len(),
            missing,
            malformed,
            "JSON extraction complete"
        );

        let confidence = 1.0 - 0.2 * missing as f32 - 0.1 * malformed as f32;
        result.with_confidence(confidence.max(0.1))
    }
}

/// Find a field by exact, case-insensitive, or substring key match,
/// skipping keys another schema field has already claimed.
fn lookup_field<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
    used: &HashSet<String>,
) -> Option<(&'a str, &'a Value)> {
    if let Some((k, v)) = obj.get_key_value(field)
        && !used.contains(k.as_str())
    {
        return Some((k, v));
    }
    let lower = field.to_ascii_lowercase();
    if let Some((k, v)) = obj
        .iter()
        .find(|(k, _)| !used.contains(k.as_str()) && k.to_ascii_lowercase() == lower)
    {
        return Some((k, v));
    }
    obj.iter()
        .find(|(k, _)| {
            if used.contains(k.as_str()) {
                return false;
            }
            let k = k.to_ascii_lowercase();
            k.contains(&lower) || lower.contains(&k)
        })
        .map(|(k, v)| (k.as_str(), v))
}

/// Validate extracted values by field-name convention.
///
/// Amount/price fields must be numeric (a `$1,250.00`-style string is
/// accepted); date fields must parse in one of the common formats.
fn validate_field(field: &str, value: &Value) -> Option<String> {
    let lower = field.to_ascii_lowercase();

    if lower.contains("amount") || lower.contains("price") {
        let ok = match value {
            Value::Number(_) => true,
            Value::String(s) => s.replace(['$', ','], "").trim().parse::<f64>().is_ok(),
            _ => false,
        };
        if !ok {
            return Some(format!("expected a numeric value, got {value}"));
        }
    }

    if lower.contains("date") || lower == "deadline" {
        let ok = match value {
            Value::String(s) => is_valid_date(s),
            _ => false,
        };
        if !ok {
            return Some(format!("expected a date, got {value}"));
        }
    }

    None
}

fn is_valid_date(s: &str) -> bool {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .any(|fmt| chrono::NaiveDate::parse_from_str(s, fmt).is_ok()
            || chrono::NaiveDateTime::parse_from_str(s, fmt).is_ok())
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Format;

    fn classification(intent: Intent) -> ClassificationResult {
        ClassificationResult::new(Format::Json, intent, 0.9, "keyword")
    }

    async fn run(payload: &str, intent: Intent) -> ExtractionResult {
        let doc = InputDocument::from_text(payload, None, None);
        JsonAgent::new().extract(&doc, &classification(intent)).await
    }

    #[tokio::test]
    async fn complete_invoice_has_no_anomalies() {
        let payload = r#"{
            "amount": 1250.0,
            "vendor": "Tech Solutions Inc",
            "date": "2024-01-15",
            "items": [{"description": "Software License", "price": 1000.0}]
        }"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(result.anomalies.is_empty(), "anomalies: {:?}", result.anomalies);
        assert_eq!(result.fields["amount"], 1250.0);
        assert_eq!(result.fields["vendor"], "Tech Solutions Inc");
        assert!(result.fields.contains_key("date"));
        assert!(result.fields.contains_key("items"));
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn missing_amount_flags_exactly_that_field() {
        let payload = r#"{
            "vendor": "Tech Solutions Inc",
            "date": "2024-01-15",
            "items": []
        }"#;
        let result = run(payload, Intent::Invoice).await;
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].field(), Some("amount"));
        // Present fields are still extracted.
        assert_eq!(result.fields["vendor"], "Tech Solutions Inc");
        assert!(result.fields.contains_key("date"));
        assert!(result.fields.contains_key("items"));
        assert!(result.confidence < 1.0);
    }

    #[tokio::test]
    async fn malformed_amount_is_flagged_but_extracted() {
        let payload = r#"{
            "amount": "twelve hundred",
            "vendor": "Acme",
            "date": "2024-01-15",
            "items": []
        }"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(matches!(
            &result.anomalies[..],
            [Anomaly::MalformedField { field, .. }] if field == "amount"
        ));
        assert_eq!(result.fields["amount"], "twelve hundred");
    }

    #[tokio::test]
    async fn currency_string_amount_is_accepted() {
        let payload = r#"{"amount": "$1,250.00", "vendor": "Acme", "date": "2024-01-15", "items": []}"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(result.anomalies.is_empty());
    }

    #[tokio::test]
    async fn bad_date_is_flagged() {
        let payload = r#"{"amount": 10, "vendor": "Acme", "date": "sometime soon", "items": []}"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(matches!(
            &result.anomalies[..],
            [Anomaly::MalformedField { field, .. }] if field == "date"
        ));
    }

    #[tokio::test]
    async fn fuzzy_key_matching_finds_fields() {
        // "invoice_amount" and "vendor_name" should satisfy "amount"/"vendor".
        let payload = r#"{
            "invoice_amount": 99.5,
            "vendor_name": "Acme",
            "date": "2024-02-01",
            "items": []
        }"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(result.anomalies.is_empty(), "anomalies: {:?}", result.anomalies);
        assert_eq!(result.fields["amount"], 99.5);
        assert_eq!(result.fields["vendor"], "Acme");
    }

    #[tokio::test]
    async fn case_insensitive_key_matching() {
        let payload = r#"{"Amount": 5, "Vendor": "A", "Date": "2024-01-01", "Items": []}"#;
        let result = run(payload, Intent::Invoice).await;
        assert!(result.anomalies.is_empty());
    }

    #[tokio::test]
    async fn unparseable_json_is_unreadable_not_fatal() {
        let result = run("{definitely not json", Intent::Invoice).await;
        assert!(matches!(&result.anomalies[..], [Anomaly::UnreadableInput { .. }]));
        assert!(result.fields.is_empty());
        assert!(result.confidence <= 0.1);
    }

    #[tokio::test]
    async fn array_payload_keeps_value_and_flags_required() {
        let result = run(r#"[1, 2, 3]"#, Intent::Invoice).await;
        assert!(result.fields.contains_key("payload"));
        assert_eq!(result.anomalies.len(), 4); // amount, vendor, date, items
    }

    #[tokio::test]
    async fn general_intent_requires_nothing() {
        let result = run(r#"{"anything": "goes"}"#, Intent::General).await;
        assert!(result.anomalies.is_empty());
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn rfq_shape_is_checked() {
        let payload = r#"{"items": ["chairs"], "deadline": "2024-03-01", "contact": "j@x.com"}"#;
        let result = run(payload, Intent::Rfq).await;
        assert!(result.anomalies.is_empty());
        let missing = run(r#"{"items": ["chairs"]}"#, Intent::Rfq).await;
        let flagged: Vec<_> = missing.anomalies.iter().filter_map(Anomaly::field).collect();
        assert_eq!(flagged, vec!["deadline", "contact"]);
    }

    #[test]
    fn date_validation_accepts_common_formats() {
        assert!(is_valid_date("2024-01-15"));
        assert!(is_valid_date("01/15/2024"));
        assert!(is_valid_date("2024-01-15 10:30:00"));
        assert!(is_valid_date("2024-01-15T10:30:00Z"));
        assert!(!is_valid_date("next Tuesday"));
    }
}
