//! Document processor — classifies, routes, extracts, persists.
//!
//! **Core invariant: every accepted document ends as exactly one stored
//! record.** Classification and extraction degrade instead of failing;
//! the only fatal error in the pipeline is a failed append to the store.
//!
//! Flow:
//! 1. Classify (format heuristics + intent strategies)
//! 2. Route to the agent registered for the classification
//! 3. Extract structured fields
//! 4. Append the assembled record to the store

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info};

use crate::agents::AgentRegistry;
use crate::classify::Classifier;
use crate::error::PipelineError;
use crate::pipeline::types::{InputDocument, ProcessingRecord};
use crate::store::RecordStore;

/// Document processor — the orchestrating core of the pipeline.
pub struct DocumentProcessor {
    classifier: Classifier,
    registry: AgentRegistry,
    store: Arc<dyn RecordStore>,
}

impl DocumentProcessor {
    pub fn new(classifier: Classifier, registry: AgentRegistry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            classifier,
            registry,
            store,
        }
    }

    /// Process one document end to end.
    ///
    /// Returns the stored record. Only a store failure is an error;
    /// classification and extraction problems surface as degraded
    /// confidence and anomalies inside the record.
    pub async fn process(&self, doc: InputDocument) -> Result<ProcessingRecord, PipelineError> {
        if doc.payload.is_empty() {
            return Err(PipelineError::Input("empty payload".into()));
        }

        info!(
            thread_id = %doc.thread_id,
            source = doc.source_name.as_deref().unwrap_or("(inline)"),
            bytes = doc.payload.len(),
            "Processing document"
        );

        let classification = self.classifier.classify(&doc).await;
        debug!(
            format = classification.format.as_str(),
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            classified_by = classification.classified_by,
            "Document classified"
        );

        let agent = self
            .registry
            .resolve(classification.format, classification.intent);
        let extraction = agent.extract(&doc, &classification).await;
        debug!(
            agent = extraction.agent.as_str(),
            fields = extraction.fields.len(),
            anomalies = extraction.anomalies.len(),
            confidence = extraction.confidence,
            "Fields extracted"
        );

        let record = ProcessingRecord::assemble(&doc, classification, extraction);
        self.store.append(&record).await?;

        info!(
            record_id = %record.id,
            thread_id = %record.thread_id,
            intent = record.classification.intent.as_str(),
            "Document processed and recorded"
        );
        Ok(record)
    }

    /// Process a file from disk, using the filename as the format hint.
    pub async fn process_file(
        &self,
        path: &Path,
        thread_id: Option<String>,
    ) -> Result<ProcessingRecord, PipelineError> {
        let payload = std::fs::read(path)
            .map_err(|e| PipelineError::Input(format!("cannot read {}: {e}", path.display())))?;
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.process(InputDocument::from_bytes(payload, source_name, thread_id))
            .await
    }

    /// Process a batch of documents independently.
    ///
    /// Failures on individual documents are logged but don't fail the
    /// entire batch.
    pub async fn process_batch(&self, docs: Vec<InputDocument>) -> Vec<ProcessingRecord> {
        let count = docs.len();
        info!(count, "Processing document batch");

        let mut results = Vec::with_capacity(count);
        for doc in docs {
            match self.process(doc).await {
                Ok(record) => results.push(record),
                Err(e) => {
                    error!(error = %e, "Failed to process document in batch");
                }
            }
        }

        info!(processed = results.len(), total = count, "Batch complete");
        results
    }

    /// Derived summary of a thread's processing history.
    ///
    /// Computed from the record log at read time; nothing about a thread
    /// is stored beyond its records.
    pub async fn thread_context(&self, thread_id: &str) -> Result<ThreadContext, PipelineError> {
        let records = self.store.list_by_thread(thread_id).await?;

        let intents = records
            .iter()
            .map(|r| r.classification.intent.as_str().to_string())
            .collect();
        let last = records.last();
        let last_sender = last
            .and_then(|r| r.extraction.fields.get("sender"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let last_subject = last
            .and_then(|r| r.extraction.fields.get("subject"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let anomaly_count = records.iter().map(|r| r.extraction.anomalies.len()).sum();

        Ok(ThreadContext {
            thread_id: thread_id.to_string(),
            document_count: records.len(),
            intents,
            last_sender,
            last_subject,
            anomaly_count,
        })
    }

    /// One-line JSON summaries of recent records (newest first).
    pub async fn recent_summaries(&self, limit: usize) -> Result<Vec<serde_json::Value>, PipelineError> {
        let records = self.store.recent(limit).await?;
        Ok(records
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "thread_id": r.thread_id,
                    "format": r.classification.format.as_str(),
                    "intent": r.classification.intent.as_str(),
                    "anomalies": r.extraction.anomalies.len(),
                    "recorded_at": r.recorded_at.to_rfc3339(),
                })
            })
            .collect())
    }
}

/// Summary of one thread's history, derived from its records.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThreadContext {
    pub thread_id: String,
    pub document_count: usize,
    /// Intent labels in processing order.
    pub intents: Vec<String>,
    pub last_sender: Option<String>,
    pub last_subject: Option<String>,
    pub anomaly_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn processor() -> DocumentProcessor {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        DocumentProcessor::new(Classifier::heuristic_only(), AgentRegistry::standard(), store)
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let p = processor().await;
        let doc = InputDocument::from_bytes(Vec::new(), None, None);
        assert!(matches!(p.process(doc).await, Err(PipelineError::Input(_))));
    }

    #[tokio::test]
    async fn processed_document_is_retrievable() {
        let p = processor().await;
        let doc = InputDocument::from_text(
            r#"{"amount": 42.0, "vendor": "Acme", "date": "2024-05-01", "items": []}"#,
            Some("invoice.json".into()),
            Some("t-proc".into()),
        );
        let record = p.process(doc).await.unwrap();

        let fetched = p.store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.classification.intent.as_str(), "invoice");
    }

    #[tokio::test]
    async fn batch_skips_failures() {
        let p = processor().await;
        let docs = vec![
            InputDocument::from_text("hello there", None, Some("t-batch".into())),
            InputDocument::from_bytes(Vec::new(), None, Some("t-batch".into())),
            InputDocument::from_text("goodbye", None, Some("t-batch".into())),
        ];
        let results = p.process_batch(docs).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn thread_context_is_derived_from_records() {
        let p = processor().await;
        p.process(InputDocument::from_text(
            "From: a@x.com\nSubject: invoice attached\n\nYour invoice is here.",
            None,
            Some("t-ctx".into()),
        ))
        .await
        .unwrap();
        p.process(InputDocument::from_text(
            "From: a@x.com\nSubject: complaint\n\nThe product is defective, I want a refund.",
            None,
            Some("t-ctx".into()),
        ))
        .await
        .unwrap();

        let ctx = p.thread_context("t-ctx").await.unwrap();
        assert_eq!(ctx.document_count, 2);
        assert_eq!(ctx.intents, vec!["invoice", "complaint"]);
        assert_eq!(ctx.last_sender.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn empty_thread_context() {
        let p = processor().await;
        let ctx = p.thread_context("nope").await.unwrap();
        assert_eq!(ctx.document_count, 0);
        assert!(ctx.intents.is_empty());
        assert!(ctx.last_sender.is_none());
    }
}
