//! Agent registry — static `(format, intent)` → agent lookup.
//!
//! Resolution order: exact `(format, intent)` override, then per-format
//! route, then the default agent. Every classified input is routable;
//! `resolve` cannot fail.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::agents::{Agent, JsonAgent, TextAgent};
use crate::pipeline::types::{Format, Intent};

/// Lookup table from classification to extraction agent.
pub struct AgentRegistry {
    overrides: HashMap<(Format, Intent), Arc<dyn Agent>>,
    by_format: HashMap<Format, Arc<dyn Agent>>,
    default_agent: Arc<dyn Agent>,
}

impl AgentRegistry {
    /// Empty registry with only a default agent.
    pub fn new(default_agent: Arc<dyn Agent>) -> Self {
        Self {
            overrides: HashMap::new(),
            by_format: HashMap::new(),
            default_agent,
        }
    }

    /// The standard routing table: JSON payloads to the JSON agent,
    /// everything text-shaped (email, plain text, PDF-after-extraction)
    /// to the text agent, which also serves as the default.
    pub fn standard() -> Self {
        let json: Arc<dyn Agent> = Arc::new(JsonAgent::new());
        let text: Arc<dyn Agent> = Arc::new(TextAgent::new());

        let mut registry = Self::new(Arc::clone(&text));
        registry.route_format(Format::Json, json);
        registry.route_format(Format::Email, Arc::clone(&text));
        registry.route_format(Format::Text, Arc::clone(&text));
        registry.route_format(Format::Pdf, text);
        registry
    }

    /// Route all documents of a format to an agent.
    pub fn route_format(&mut self, format: Format, agent: Arc<dyn Agent>) {
        self.by_format.insert(format, agent);
    }

    /// Route one exact `(format, intent)` pair to an agent, overriding the
    /// per-format route.
    pub fn route(&mut self, format: Format, intent: Intent, agent: Arc<dyn Agent>) {
        self.overrides.insert((format, intent), agent);
    }

    /// Select the agent for a classification. Always succeeds.
    pub fn resolve(&self, format: Format, intent: Intent) -> Arc<dyn Agent> {
        let agent = self
            .overrides
            .get(&(format, intent))
            .or_else(|| self.by_format.get(&format))
            .unwrap_or(&self.default_agent);
        debug!(
            format = format.as_str(),
            intent = intent.as_str(),
            agent = agent.kind().as_str(),
            "Resolved agent"
        );
        Arc::clone(agent)
    }
}
