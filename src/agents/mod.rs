//! Extraction agents — format-specialized field extraction.
//!
//! An agent never fails past its boundary: malformed or partially
//! parseable input produces a lower confidence and a populated anomaly
//! list, not an error.

pub mod json_agent;
pub mod registry;
pub mod text_agent;

pub use json_agent::JsonAgent;
pub use registry::AgentRegistry;
pub use text_agent::TextAgent;

use async_trait::async_trait;

use crate::pipeline::types::{AgentKind, ClassificationResult, ExtractionResult, InputDocument};

/// Extraction capability, polymorphic over document format.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which agent this is, recorded in the extraction result.
    fn kind(&self) -> AgentKind;

    /// Extract structured fields from a classified document.
    ///
    /// Infallible by contract — anything unexpected becomes an anomaly.
    async fn extract(
        &self,
        doc: &InputDocument,
        classification: &ClassificationResult,
    ) -> ExtractionResult;
}
