//! Remote intent strategy — OpenAI-compatible chat-completions call.
//!
//! Sends a content preview to a hosted model (OpenRouter by default) and
//! parses one label from the fixed intent enumeration plus a confidence.
//! The call itself may fail or stall; the surrounding
//! [`Classifier`](crate::classify::Classifier) bounds it with a timeout
//! and degrades — nothing here is allowed to take the request down.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::classify::intent::{IntentClassifier, IntentGuess};
use crate::error::ClassifierError;
use crate::pipeline::types::{Format, Intent};

/// Default chat-completions endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Max content characters sent to the model (runs on every ambiguous input).
const PREVIEW_CHARS: usize = 1500;

/// Max tokens for the classification reply — a label and a number.
const MAX_TOKENS: u32 = 64;

/// Remote intent classifier over an OpenAI-compatible chat-completions API.
pub struct OpenRouterClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenRouterClassifier {
    pub fn new(api_key: SecretString, model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl IntentClassifier for OpenRouterClassifier {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn classify(&self, text: &str, _format: Format) -> Result<IntentGuess, ClassifierError> {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt() },
                { "role": "user", "content": preview },
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::RequestFailed {
                provider: self.name().into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::RequestFailed {
                provider: self.name().into(),
                reason: format!("HTTP {status}"),
            });
        }

        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|e| ClassifierError::InvalidResponse {
                    provider: self.name().into(),
                    reason: e.to_string(),
                })?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassifierError::InvalidResponse {
                provider: self.name().into(),
                reason: "no choices in response".into(),
            })?;

        let guess = parse_intent_reply(content)?;
        debug!(
            intent = guess.intent.as_str(),
            confidence = guess.confidence,
            model = %self.model,
            "Remote intent classification"
        );
        Ok(guess)
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

// ── Prompt and reply parsing ────────────────────────────────────────

fn system_prompt() -> &'static str {
    "You classify business documents. Choose exactly one intent:\n\
     - invoice: bills, payment requests, receipts\n\
     - rfq: requests for quotes, procurement requests\n\
     - complaint: customer complaints, issues, negative feedback\n\
     - regulation: legal documents, compliance, policies\n\
     - general: anything else\n\n\
     Respond with ONLY a JSON object: {\"intent\": \"...\", \"confidence\": 0.0}\n\
     where confidence is your certainty between 0.0 and 1.0."
}

/// Model reply structure.
#[derive(Debug, Deserialize)]
struct IntentReply {
    intent: String,
    #[serde(default = "default_reply_confidence")]
    confidence: f32,
}

fn default_reply_confidence() -> f32 {
    0.5
}

/// Parse the model reply into an `IntentGuess`.
///
/// Tries the requested JSON object first (tolerating markdown wrapping),
/// then a bare label, since smaller models often answer with one word.
fn parse_intent_reply(raw: &str) -> Result<IntentGuess, ClassifierError> {
    let json_str = extract_json_object(raw);
    if let Ok(reply) = serde_json::from_str::<IntentReply>(&json_str) {
        let intent =
            Intent::parse_label(&reply.intent).ok_or_else(|| ClassifierError::UnknownLabel {
                label: reply.intent.clone(),
            })?;
        return Ok(IntentGuess::new(intent, reply.confidence));
    }

    if let Some(intent) = Intent::parse_label(raw) {
        warn!(raw = %raw.trim(), "Model answered with a bare label instead of JSON");
        return Ok(IntentGuess::new(intent, default_reply_confidence()));
    }

    Err(ClassifierError::InvalidResponse {
        provider: "openrouter".into(),
        reason: format!("unparseable reply: {}", raw.chars().take(120).collect::<String>()),
    })
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
