//! libSQL backend — async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Appends are single
//! INSERTs, so each one commits atomically; `seq` (the rowid) fixes the
//! append order within and across threads.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{
    AgentKind, Anomaly, ClassificationResult, ExtractionResult, Format, Intent, ProcessingRecord,
};
use crate::store::migrations;
use crate::store::traits::RecordStore;

/// libSQL record store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

const RECORD_COLUMNS: &str = "id, thread_id, source_name, digest, format, intent, \
     class_confidence, classified_by, agent, fields, anomalies, agent_confidence, recorded_at";

/// Map a libsql Row to a ProcessingRecord.
///
/// Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<ProcessingRecord, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("record id: {e}")))?;
    let thread_id: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("record thread_id: {e}")))?;
    let source_name: Option<String> = row.get(2).ok();
    let digest: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("record digest: {e}")))?;
    let format_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("record format: {e}")))?;
    let intent_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("record intent: {e}")))?;
    let class_confidence: f64 = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("record class_confidence: {e}")))?;
    let classified_by: String = row
        .get(7)
        .map_err(|e| DatabaseError::Query(format!("record classified_by: {e}")))?;
    let agent_str: String = row
        .get(8)
        .map_err(|e| DatabaseError::Query(format!("record agent: {e}")))?;
    let fields_str: String = row
        .get(9)
        .map_err(|e| DatabaseError::Query(format!("record fields: {e}")))?;
    let anomalies_str: String = row
        .get(10)
        .map_err(|e| DatabaseError::Query(format!("record anomalies: {e}")))?;
    let agent_confidence: f64 = row
        .get(11)
        .map_err(|e| DatabaseError::Query(format!("record agent_confidence: {e}")))?;
    let recorded_str: String = row
        .get(12)
        .map_err(|e| DatabaseError::Query(format!("record recorded_at: {e}")))?;

    let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&fields_str)
        .map_err(|e| DatabaseError::Serialization(format!("record fields: {e}")))?;
    let anomalies: Vec<Anomaly> = serde_json::from_str(&anomalies_str)
        .map_err(|e| DatabaseError::Serialization(format!("record anomalies: {e}")))?;

    Ok(ProcessingRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("record id: {e}")))?,
        thread_id,
        source_name,
        digest,
        classification: ClassificationResult::new(
            Format::parse(&format_str),
            Intent::parse(&intent_str),
            class_confidence as f32,
            classified_by_label(&classified_by),
        ),
        extraction: ExtractionResult {
            agent: AgentKind::parse(&agent_str),
            fields,
            anomalies,
            confidence: agent_confidence as f32,
        },
        recorded_at: parse_datetime(&recorded_str),
    })
}

/// Intern a stored classifier label back to its static form.
fn classified_by_label(s: &str) -> &'static str {
    match s {
        "keyword" => "keyword",
        "openrouter" => "openrouter",
        "fallback" => "fallback",
        "mock-remote" => "mock-remote",
        _ => "unknown",
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RecordStore for LibSqlBackend {
    async fn append(&self, record: &ProcessingRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let fields = serde_json::to_string(&record.extraction.fields)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let anomalies = serde_json::to_string(&record.extraction.anomalies)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO processing_records (id, thread_id, source_name, digest, format, intent, \
                class_confidence, classified_by, agent, fields, anomalies, agent_confidence, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id.to_string(),
                record.thread_id.clone(),
                opt_text(record.source_name.as_deref()),
                record.digest.clone(),
                record.classification.format.as_str(),
                record.classification.intent.as_str(),
                record.classification.confidence as f64,
                record.classification.classified_by,
                record.extraction.agent.as_str(),
                fields,
                anomalies,
                record.extraction.confidence as f64,
                record.recorded_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("append record: {e}")))?;

        debug!(record_id = %record.id, thread_id = %record.thread_id, "Record appended");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM processing_records WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get record: {e}"))),
        }
    }

    async fn list_by_thread(
        &self,
        thread_id: &str,
    ) -> Result<Vec<ProcessingRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM processing_records \
                     WHERE thread_id = ?1 ORDER BY seq ASC"
                ),
                params![thread_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_by_thread: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping record row: {e}"),
            }
        }
        Ok(records)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM processing_records \
                     ORDER BY seq DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent records: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping record row: {e}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::InputDocument;

    fn sample_record(thread_id: &str) -> ProcessingRecord {
        let doc = InputDocument::from_text(
            r#"{"amount": 10}"#,
            Some("inv.json".into()),
            Some(thread_id.into()),
        );
        let classification = ClassificationResult::new(Format::Json, Intent::Invoice, 0.9, "keyword");
        let mut extraction = ExtractionResult::new(AgentKind::Json);
        extraction.set_field("amount", serde_json::json!(10));
        extraction.push_anomaly(Anomaly::MissingField { field: "vendor".into() });
        ProcessingRecord::assemble(&doc, classification, extraction.with_confidence(0.8))
    }

    #[tokio::test]
    async fn append_then_get_roundtrips() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let record = sample_record("t-1");
        store.append(&record).await.unwrap();

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.thread_id, "t-1");
        assert_eq!(fetched.digest, record.digest);
        assert_eq!(fetched.classification.format, Format::Json);
        assert_eq!(fetched.classification.intent, Intent::Invoice);
        assert_eq!(fetched.classification.classified_by, "keyword");
        assert_eq!(fetched.extraction.agent, AgentKind::Json);
        assert_eq!(fetched.extraction.fields["amount"], 10);
        assert_eq!(fetched.extraction.anomalies, record.extraction.anomalies);
        assert!((fetched.extraction.confidence - 0.8).abs() < 0.001);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_thread_preserves_append_order() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let records: Vec<_> = (0..5).map(|_| sample_record("t-ord")).collect();
        for record in &records {
            store.append(record).await.unwrap();
        }
        store.append(&sample_record("t-other")).await.unwrap();

        let listed = store.list_by_thread("t-ord").await.unwrap();
        assert_eq!(listed.len(), 5);
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        let expected: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn duplicate_id_append_fails_without_partial_write() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let record = sample_record("t-dup");
        store.append(&record).await.unwrap();
        assert!(store.append(&record).await.is_err());

        let listed = store.list_by_thread("t-dup").await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let a = sample_record("t-a");
        let b = sample_record("t-b");
        store.append(&a).await.unwrap();
        store.append(&b).await.unwrap();

        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, b.id);
    }

    #[tokio::test]
    async fn local_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let record = sample_record("t-durable");

        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            store.append(&record).await.unwrap();
        }

        let store = LibSqlBackend::new_local(&path).await.unwrap();
        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.thread_id, "t-durable");
    }
}
