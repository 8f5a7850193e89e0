//! Output artifacts: downloaded attachments and rendered message bodies.

pub mod attachment;
pub mod document;
