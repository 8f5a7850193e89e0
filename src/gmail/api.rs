//! The mail-provider calls the pipeline depends on.

use crate::error::Result;
use crate::model::message::Message;

/// Largest page size the Gmail listing endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 500;

/// One page of a message listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Blocking access to a mailbox.
///
/// [`crate::gmail::client::GmailClient`] talks to the Gmail REST API; tests
/// substitute an in-memory mailbox.
pub trait MailApi {
    /// List message ids matching `query`, at most `page_size` per call.
    fn list_messages(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<MessagePage>;

    /// Fetch one message with its full content tree.
    fn get_message(&self, message_id: &str) -> Result<Message>;

    /// Fetch an attachment's base64url-encoded payload.
    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String>;
}

impl<T: MailApi + ?Sized> MailApi for &T {
    fn list_messages(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        (**self).list_messages(query, page_size, page_token)
    }

    fn get_message(&self, message_id: &str) -> Result<Message> {
        (**self).get_message(message_id)
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        (**self).get_attachment(message_id, attachment_id)
    }
}
