//! Message retrieval: paginated id listing and per-message detail loading.

use crate::gmail::api::{MailApi, MAX_PAGE_SIZE};
use crate::model::message::Message;

/// List up to `max_messages` ids matching `query`, following pagination.
///
/// Stops when the maximum is reached, when no next page is reported, or when
/// a page comes back shorter than requested. A failed page ends the listing
/// and whatever was gathered so far is returned.
pub fn fetch_message_ids<A: MailApi + ?Sized>(
    api: &A,
    query: &str,
    max_messages: usize,
) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    tracing::info!(query, max_messages, "Searching for messages");

    while ids.len() < max_messages {
        let page_size = (max_messages - ids.len()).min(MAX_PAGE_SIZE);
        let page = match api.list_messages(query, page_size, page_token.as_deref()) {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    page = pages + 1,
                    collected = ids.len(),
                    "Message listing failed, keeping partial results"
                );
                break;
            }
        };
        pages += 1;

        let received = page.ids.len();
        let room = max_messages - ids.len();
        ids.extend(page.ids.into_iter().take(room));
        tracing::debug!(page = pages, received, total = ids.len(), "Fetched listing page");

        if received < page_size {
            break;
        }
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    tracing::info!(count = ids.len(), pages, "Found messages");
    ids
}

/// Load one message's full structure. Failures are logged and yield `None`.
pub fn load_message<A: MailApi + ?Sized>(api: &A, message_id: &str) -> Option<Message> {
    match api.get_message(message_id) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::error!(message_id, error = %e, "Failed to load message details");
            None
        }
    }
}
