//! Gmail message resource as returned by `users.messages.get?format=full`.
//!
//! Only the fields the downloader reads are modelled. Unknown fields are
//! ignored by serde, so newer API responses still deserialize.

use serde::{Deserialize, Serialize};

/// A single message with its full MIME part tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque Gmail message ID.
    pub id: String,

    /// Thread the message belongs to.
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Short plain-text excerpt produced by Gmail.
    #[serde(default)]
    pub snippet: Option<String>,

    /// Root of the content tree. Missing for `format=minimal` responses.
    #[serde(default)]
    pub payload: Option<ContentNode>,
}

/// One node in a message's nested content structure.
///
/// A node with children is a container (`multipart/*`). A leaf is either an
/// attachment (non-empty `filename` plus `body.attachment_id`) or an inline
/// body whose `body.data` carries base64url-encoded text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(default)]
    pub part_id: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// Gmail sends an empty string for non-attachment parts.
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub body: Option<PartBody>,

    #[serde(default)]
    pub parts: Vec<ContentNode>,
}

/// Body descriptor of a content node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// Handle used to fetch the attachment payload separately.
    #[serde(default)]
    pub attachment_id: Option<String>,

    /// Size in bytes of the decoded body.
    #[serde(default)]
    pub size: u64,

    /// Inline base64url-encoded data (small bodies only).
    #[serde(default)]
    pub data: Option<String>,
}

/// A single `(name, value)` header pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Response of `users.messages.attachments.get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentBody {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: String,
}

/// Response of `users.messages.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// A bare message reference from a listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl Message {
    /// Top-level headers (those of the root payload).
    pub fn headers(&self) -> &[Header] {
        self.payload
            .as_ref()
            .map(|p| p.headers.as_slice())
            .unwrap_or(&[])
    }

    /// Value of the first header named `name` (case-insensitive), or `default`.
    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        find_header(self.headers(), name).unwrap_or(default)
    }

    /// The `Subject` header, or `"No Subject"` when absent.
    pub fn subject(&self) -> &str {
        self.header_or("subject", crate::naming::DEFAULT_SUBJECT)
    }
}

impl ContentNode {
    /// The filename when present and non-empty.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref().filter(|f| !f.is_empty())
    }

    /// The attachment handle when present and non-empty.
    pub fn attachment_id(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.attachment_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Inline body data when present and non-empty.
    pub fn inline_data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Lowercased MIME type without parameters.
    pub fn mime_essence(&self) -> String {
        self.mime_type
            .as_deref()
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }

    /// `charset` parameter of this part's `Content-Type` header, if any.
    pub fn charset(&self) -> Option<String> {
        let content_type = find_header(&self.headers, "content-type")?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
    }
}

/// Return the value of the first header whose name matches `name`
/// case-insensitively. Never fails on absence.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, value: &str) -> Header {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_deserialize_gmail_message() {
        let json = r#"{
            "id": "18c2f0a1b2c3d4e5",
            "threadId": "18c2f0a1b2c3d4e5",
            "labelIds": ["INBOX"],
            "payload": {
                "partId": "",
                "mimeType": "multipart/mixed",
                "filename": "",
                "headers": [{"name": "Subject", "value": "Invoice"}],
                "body": {"size": 0},
                "parts": [
                    {
                        "partId": "1",
                        "mimeType": "application/pdf",
                        "filename": "invoice.pdf",
                        "body": {"attachmentId": "ANGjdJ8", "size": 1024}
                    }
                ]
            }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "18c2f0a1b2c3d4e5");
        assert_eq!(msg.subject(), "Invoice");
        let payload = msg.payload.unwrap();
        assert_eq!(payload.parts.len(), 1);
        assert_eq!(payload.parts[0].filename(), Some("invoice.pdf"));
        assert_eq!(payload.parts[0].attachment_id(), Some("ANGjdJ8"));
        assert_eq!(payload.filename(), None);
    }

    #[test]
    fn test_header_lookup_case_insensitive_first_match() {
        let headers = vec![
            header("SUBJECT", "first"),
            header("subject", "second"),
            header("From", "a@b.com"),
        ];
        assert_eq!(find_header(&headers, "Subject"), Some("first"));
        assert_eq!(find_header(&headers, "from"), Some("a@b.com"));
        assert_eq!(find_header(&headers, "date"), None);
    }

    #[test]
    fn test_subject_defaults_when_missing() {
        let msg = Message {
            id: "x".into(),
            ..Default::default()
        };
        assert_eq!(msg.subject(), "No Subject");
        assert_eq!(msg.header_or("date", ""), "");
    }

    #[test]
    fn test_charset_parameter() {
        let node = ContentNode {
            mime_type: Some("text/plain".into()),
            headers: vec![header(
                "Content-Type",
                "text/plain; charset=\"ISO-8859-1\"; format=flowed",
            )],
            ..Default::default()
        };
        assert_eq!(node.charset().as_deref(), Some("ISO-8859-1"));
        assert_eq!(node.mime_essence(), "text/plain");
    }
}
