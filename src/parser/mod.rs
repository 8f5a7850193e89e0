//! Gmail payload parsing: transport decoding and content tree traversal.

pub mod body;
pub mod walker;
