//! Document pipeline — shared types and the orchestrating processor.

pub mod processor;
pub mod types;

pub use processor::{DocumentProcessor, ThreadContext};
pub use types::{
    AgentKind, Anomaly, ClassificationResult, ExtractionResult, Format, InputDocument, Intent,
    ProcessingRecord, Urgency,
};
