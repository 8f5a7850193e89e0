//! Deterministic, filesystem-safe destination paths for downloaded artifacts.
//!
//! Paths depend only on (subject, message id, filename, grouping flag), so
//! re-running against the same mailbox overwrites instead of duplicating.

use std::path::PathBuf;

/// Label used when a subject is missing or sanitizes to nothing.
pub const DEFAULT_SUBJECT: &str = "No Subject";

/// Maximum number of characters kept from the subject.
pub const SUBJECT_MAX_CHARS: usize = 50;

/// Number of message-id characters used as a disambiguating prefix.
pub const ID_PREFIX_CHARS: usize = 8;

/// Stem of the rendered message body file.
pub const DOCUMENT_STEM: &str = "email_content";

/// Keep alphanumerics, spaces, hyphens, and underscores; cap the length;
/// drop trailing spaces. Idempotent.
pub fn sanitize_subject(subject: &str) -> String {
    let kept: String = subject
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(SUBJECT_MAX_CHARS)
        .collect();
    let trimmed = kept.trim_end();
    if trimmed.is_empty() {
        DEFAULT_SUBJECT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// First [`ID_PREFIX_CHARS`] characters of a message id.
pub fn id_prefix(message_id: &str) -> String {
    message_id.chars().take(ID_PREFIX_CHARS).collect()
}

/// Neutralize path separators so an attachment name cannot leave its directory.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}

/// Build the relative destination for an artifact.
///
/// `filename` is the attachment's original name, or `None` for the rendered
/// body, in which case `email_content.{document_ext}` is used.
pub fn destination(
    subject: &str,
    message_id: &str,
    filename: Option<&str>,
    group_by_subject: bool,
    document_ext: &str,
) -> PathBuf {
    let name = match filename {
        Some(f) => sanitize_filename(f),
        None => format!("{DOCUMENT_STEM}.{document_ext}"),
    };
    let prefix = id_prefix(message_id);

    if group_by_subject {
        let folder = format!("{}_{prefix}", sanitize_subject(subject));
        PathBuf::from(folder).join(name)
    } else {
        PathBuf::from(format!("{prefix}_{name}"))
    }
}

/// Naming settings fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    pub group_by_subject: bool,
}

impl NamingPolicy {
    pub fn new(group_by_subject: bool) -> Self {
        Self { group_by_subject }
    }

    /// Destination of an attachment.
    pub fn attachment_path(&self, subject: &str, message_id: &str, filename: &str) -> PathBuf {
        destination(subject, message_id, Some(filename), self.group_by_subject, "")
    }

    /// Destination of a rendered message body with extension `ext`.
    pub fn document_path(&self, subject: &str, message_id: &str, ext: &str) -> PathBuf {
        destination(subject, message_id, None, self.group_by_subject, ext)
    }
}
