//! `gmail-attachment-dl`: download Gmail attachments matching a search query.
//!
//! This crate provides the core library: paginated message listing, content
//! tree walking, subject/filename filtering, deterministic output naming,
//! attachment download, and rendering of attachment-less message bodies.

pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod gmail;
pub mod model;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod signal;
