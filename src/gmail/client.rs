//! Gmail REST v1 client (blocking).

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{DownloadError, Result};
use crate::model::message::{AttachmentBody, Message, MessageList};

use super::api::{MailApi, MessagePage, MAX_PAGE_SIZE};

/// Base URL for the authenticated user's mailbox.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail API client bound to one access token.
pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    /// Build a client for the default Gmail endpoint.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(GMAIL_API_BASE, access_token, timeout)
    }

    /// Build a client against a custom endpoint (proxies, test servers).
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.access_token)
    }

    fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send()?;
        let response = check_status(response)?;
        let text = response.text()?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Turn non-success statuses into [`DownloadError::Api`].
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(DownloadError::Api {
        status: status.as_u16(),
        body,
    })
}

impl MailApi for GmailClient {
    fn list_messages(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<MessagePage> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut request = self
            .get("messages")
            .query(&[("q", query), ("maxResults", page_size.as_str())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let list: MessageList = Self::send_json(request)?;
        tracing::debug!(
            count = list.messages.len(),
            estimate = list.result_size_estimate.unwrap_or(0),
            has_next = list.next_page_token.is_some(),
            "Listed message page"
        );
        Ok(MessagePage {
            ids: list.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: list.next_page_token,
        })
    }

    fn get_message(&self, message_id: &str) -> Result<Message> {
        let request = self
            .get(&format!("messages/{message_id}"))
            .query(&[("format", "full")]);
        Self::send_json(request)
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        let request = self.get(&format!(
            "messages/{message_id}/attachments/{attachment_id}"
        ));
        let body: AttachmentBody = Self::send_json(request)?;
        Ok(body.data)
    }
}
