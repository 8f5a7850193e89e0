//! Derived, per-message summary used by the fallback renderer.

use super::message::Message;

/// Headers and inline bodies of one message, flattened for rendering.
///
/// Built once per message and dropped after rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    /// First `text/plain` body found in pre-order, decoded.
    pub text: Option<String>,
    /// First `text/html` body found in pre-order, decoded.
    pub html: Option<String>,
}

impl EmailContent {
    /// Combine a message's headers with the bodies found by the walker.
    pub fn from_message(message: &Message, text: Option<String>, html: Option<String>) -> Self {
        Self {
            subject: message.subject().to_string(),
            from: message.header_or("from", "").to_string(),
            to: message.header_or("to", "").to_string(),
            date: message.header_or("date", "").to_string(),
            text,
            html,
        }
    }

    /// Whether neither body is present.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.html.is_none()
    }
}
