//! Record store trait — minimal interface for pipeline persistence.
//!
//! Append-only by contract: implementations expose no update or delete.
//! An append is atomic, and records within a thread read back in the
//! order they were appended.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::ProcessingRecord;

/// Backend-agnostic append-only record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one record. All-or-nothing; a failed append leaves the
    /// store unchanged.
    async fn append(&self, record: &ProcessingRecord) -> Result<(), DatabaseError>;

    /// Fetch a single record by id.
    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRecord>, DatabaseError>;

    /// All records for a thread, in append order.
    async fn list_by_thread(&self, thread_id: &str) -> Result<Vec<ProcessingRecord>, DatabaseError>;

    /// The most recently appended records across all threads, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>, DatabaseError>;
}
