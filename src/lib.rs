//! Docflow — document intake pipeline.
//!
//! Classify an inbound document's format and intent, route it to a
//! format-specialized extraction agent, and persist the result as an
//! append-only processing record.

pub mod agents;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod store;
