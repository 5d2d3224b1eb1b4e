//! Shared types for the document intake pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ── Input document ──────────────────────────────────────────────────

/// Raw inbound document, immutable once received.
///
/// The payload is kept as bytes so PDF inputs survive intact; text-based
/// callers use [`InputDocument::from_text`].
#[derive(Debug, Clone)]
pub struct InputDocument {
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Declared filename or extension hint, if any.
    pub source_name: Option<String>,
    /// Thread/session id linking related documents.
    pub thread_id: String,
    /// When the document was received.
    pub received_at: DateTime<Utc>,
}

impl InputDocument {
    /// Build a document from raw bytes. Generates a thread id when none is given.
    pub fn from_bytes(
        payload: Vec<u8>,
        source_name: Option<String>,
        thread_id: Option<String>,
    ) -> Self {
        Self {
            payload,
            source_name,
            thread_id: thread_id.unwrap_or_else(|| format!("thread-{}", Uuid::new_v4())),
            received_at: Utc::now(),
        }
    }

    /// Build a document from pasted text.
    pub fn from_text(
        text: impl Into<String>,
        source_name: Option<String>,
        thread_id: Option<String>,
    ) -> Self {
        Self::from_bytes(text.into().into_bytes(), source_name, thread_id)
    }

    /// Lossy UTF-8 view of the payload.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// SHA-256 hex digest of the payload.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.payload);
        format!("{:x}", hasher.finalize())
    }

    /// Lowercased extension of the source name, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.source_name.as_ref()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Structural type of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Json,
    Email,
    Pdf,
    Text,
    Unknown,
}

impl Format {
    /// DB/display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Email => "email",
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a DB label. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            "email" => Self::Email,
            "pdf" => Self::Pdf,
            "text" => Self::Text,
            _ => Self::Unknown,
        }
    }
}

/// Business purpose inferred from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Invoice,
    Rfq,
    Complaint,
    Regulation,
    General,
    Unknown,
}

impl Intent {
    /// DB/display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Rfq => "rfq",
            Self::Complaint => "complaint",
            Self::Regulation => "regulation",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a DB label. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "invoice" => Self::Invoice,
            "rfq" => Self::Rfq,
            "complaint" => Self::Complaint,
            "regulation" => Self::Regulation,
            "general" => Self::General,
            _ => Self::Unknown,
        }
    }

    /// Parse a label from an external classifier, tolerating case and
    /// surrounding punctuation (LLMs rarely answer with a bare token).
    pub fn parse_label(label: &str) -> Option<Self> {
        let cleaned: String = label
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_ascii_lowercase();
        match cleaned.as_str() {
            "invoice" => Some(Self::Invoice),
            "rfq" => Some(Self::Rfq),
            "complaint" => Some(Self::Complaint),
            "regulation" => Some(Self::Regulation),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Result of classifying one input document. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub format: Format,
    pub intent: Intent,
    /// Classifier confidence in [0, 1]. Distinct from agent confidence.
    pub confidence: f32,
    /// Which strategy produced the intent ("keyword", "openrouter", "fallback").
    pub classified_by: &'static str,
}

impl ClassificationResult {
    pub fn new(format: Format, intent: Intent, confidence: f32, classified_by: &'static str) -> Self {
        Self {
            format,
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            classified_by,
        }
    }

    /// Degraded classification used when intent cannot be determined.
    pub fn fallback(format: Format) -> Self {
        Self::new(format, Intent::General, 0.0, "fallback")
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Which agent produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Json,
    Text,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// A detected missing or malformed expected field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A required field for the classified intent is absent.
    MissingField { field: String },
    /// A field is present but its value does not parse as expected.
    MalformedField { field: String, reason: String },
    /// The payload itself could not be (fully) read.
    UnreadableInput { reason: String },
}

impl Anomaly {
    /// The field this anomaly concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::MalformedField { field, .. } => Some(field),
            Self::UnreadableInput { .. } => None,
        }
    }
}

/// Urgency assessed from lexical cues (text/email agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Structured fields extracted by exactly one agent per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub agent: AgentKind,
    /// Extracted field name → value.
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Missing/malformed field reports. Empty means a clean extraction.
    pub anomalies: Vec<Anomaly>,
    /// Agent confidence in [0, 1]. Distinct from classifier confidence.
    pub confidence: f32,
}

impl ExtractionResult {
    pub fn new(agent: AgentKind) -> Self {
        Self {
            agent,
            fields: serde_json::Map::new(),
            anomalies: Vec::new(),
            confidence: 1.0,
        }
    }

    /// Insert an extracted field.
    pub fn set_field(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(name.into(), value);
    }

    /// Record an anomaly.
    pub fn push_anomaly(&mut self, anomaly: Anomaly) {
        self.anomalies.push(anomaly);
    }

    /// Clamp confidence into [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

// ── Processing record ───────────────────────────────────────────────

/// The durable unit — one classification and one extraction per input.
/// Append-only; never updated or deleted once written.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingRecord {
    pub id: Uuid,
    pub thread_id: String,
    pub source_name: Option<String>,
    /// SHA-256 hex digest of the input payload.
    pub digest: String,
    pub classification: ClassificationResult,
    pub extraction: ExtractionResult,
    pub recorded_at: DateTime<Utc>,
}

impl ProcessingRecord {
    /// Assemble a record for an already-classified, already-extracted document.
    pub fn assemble(
        doc: &InputDocument,
        classification: ClassificationResult,
        extraction: ExtractionResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: doc.thread_id.clone(),
            source_name: doc.source_name.clone(),
            digest: doc.digest(),
            classification,
            extraction,
            recorded_at: Utc::now(),
        }
    }
}
