//! Format and intent classification.
//!
//! Flow per document:
//! 1. Structural format detection (no network)
//! 2. Keyword/structure heuristics (fast path) — confident match short-circuits
//! 3. Remote strategy for ambiguous content, bounded by a timeout
//!
//! A failed or slow remote call degrades to `Intent::General` with
//! confidence 0.0. Classification never errors and never blocks
//! indefinitely.

pub mod format;
pub mod intent;
pub mod openrouter;

pub use format::detect_format;
pub use intent::{IntentClassifier, IntentGuess, KeywordClassifier};
pub use openrouter::OpenRouterClassifier;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::pipeline::types::{ClassificationResult, Format, InputDocument};

/// Heuristic guesses below this confidence consult the remote strategy.
const HEURISTIC_THRESHOLD: f32 = 0.6;

/// Default bound on the remote intent call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Document classifier — structural format detection plus pluggable
/// intent strategies.
pub struct Classifier {
    heuristic: KeywordClassifier,
    remote: Option<Arc<dyn IntentClassifier>>,
    remote_timeout: Duration,
}

impl Classifier {
    /// Classifier with an optional remote strategy for ambiguous content.
    pub fn new(remote: Option<Arc<dyn IntentClassifier>>, remote_timeout: Duration) -> Self {
        Self {
            heuristic: KeywordClassifier::new(),
            remote,
            remote_timeout,
        }
    }

    /// Heuristics-only classifier (no network, fully deterministic).
    pub fn heuristic_only() -> Self {
        Self::new(None, DEFAULT_REMOTE_TIMEOUT)
    }

    /// Classify a document's format and intent.
    ///
    /// Infallible: any remote failure is absorbed into a degraded result.
    pub async fn classify(&self, doc: &InputDocument) -> ClassificationResult {
        let format = detect_format(doc);
        let text = readable_view(doc, format);

        let guess = self
            .heuristic
            .classify(&text, format)
            .await
            .unwrap_or(IntentGuess::undecided());

        if guess.confidence >= HEURISTIC_THRESHOLD {
            debug!(
                format = format.as_str(),
                intent = guess.intent.as_str(),
                "Heuristic classification — skipping remote call"
            );
            return ClassificationResult::new(
                format,
                guess.intent,
                guess.confidence,
                self.heuristic.name(),
            );
        }

        let Some(remote) = &self.remote else {
            return if guess.confidence > 0.0 {
                ClassificationResult::new(format, guess.intent, guess.confidence, self.heuristic.name())
            } else {
                ClassificationResult::fallback(format)
            };
        };

        match tokio::time::timeout(self.remote_timeout, remote.classify(&text, format)).await {
            Ok(Ok(remote_guess)) => ClassificationResult::new(
                format,
                remote_guess.intent,
                remote_guess.confidence,
                remote.name(),
            ),
            Ok(Err(e)) => {
                warn!(error = %e, "Remote intent classification failed — degrading to general");
                ClassificationResult::fallback(format)
            }
            Err(_) => {
                let e = crate::error::ClassifierError::Timeout {
                    provider: remote.name().into(),
                    timeout: self.remote_timeout,
                };
                warn!(error = %e, "Remote intent classification timed out — degrading to general");
                ClassificationResult::fallback(format)
            }
        }
    }
}

/// Readable text view of a payload for intent classification.
///
/// PDFs go through the text-extraction pre-step; an unreadable PDF falls
/// back to a lossy byte view so heuristics can still run.
fn readable_view(doc: &InputDocument, format: Format) -> String {
    match format {
        Format::Pdf => crate::extract::pdf_text(&doc.payload).unwrap_or_else(|e| {
            warn!(error = %e, "PDF text extraction failed during classification");
            doc.text_lossy()
        }),
        _ => doc.text_lossy(),
    }
}
