//! Core data model types: Gmail messages, content summaries, and run statistics.

pub mod content;
pub mod message;
pub mod stats;
