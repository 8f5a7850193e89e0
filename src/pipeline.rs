//! Batch orchestration: list, load, walk, filter, download or render.
//!
//! Messages are handled one at a time on the calling thread. Every failure is
//! confined to its unit of work (a page, a message, an attachment) and the
//! run moves on; only statistics leave this module.

use std::cell::Cell;

use humansize::{format_size, BINARY};

use crate::config::RunOptions;
use crate::error::DownloadError;
use crate::export::attachment::materialize_attachment;
use crate::export::document::FallbackRenderer;
use crate::fetch::{fetch_message_ids, load_message};
use crate::gmail::api::MailApi;
use crate::model::content::EmailContent;
use crate::model::message::Message;
use crate::model::stats::{MessageOutcome, RunStats};
use crate::parser::walker::{walk, WalkResult};
use crate::signal::Interrupt;

/// Drives one run over a mailbox.
pub struct Orchestrator<'a, A: MailApi + ?Sized> {
    api: &'a A,
    options: &'a RunOptions,
    renderer: &'a FallbackRenderer,
    interrupt: Interrupt,
    /// Set once the renderer's unavailability has been reported.
    unavailable_reported: Cell<bool>,
}

impl<'a, A: MailApi + ?Sized> Orchestrator<'a, A> {
    pub fn new(api: &'a A, options: &'a RunOptions, renderer: &'a FallbackRenderer) -> Self {
        Self {
            api,
            options,
            renderer,
            interrupt: Interrupt::new(),
            unavailable_reported: Cell::new(false),
        }
    }

    /// Use `interrupt` as the stop flag (shared with the signal listener).
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Process every matching message.
    ///
    /// The progress callback receives `(current, total)`. When interrupted,
    /// the statistics gathered so far are returned with `interrupted` set.
    pub fn run(&self, progress: &dyn Fn(usize, usize)) -> RunStats {
        let mut stats = RunStats::default();
        tracing::info!(
            output_dir = %self.options.output_dir.display(),
            "Starting attachment download"
        );

        let ids = fetch_message_ids(self.api, &self.options.query, self.options.max_messages);
        stats.messages_listed = ids.len();
        let total = ids.len();

        for (i, message_id) in ids.iter().enumerate() {
            if self.interrupt.is_triggered() {
                stats.interrupted = true;
                break;
            }
            progress(i, total);
            tracing::info!(message_id = %message_id, "Processing message {}/{}", i + 1, total);

            let Some(message) = load_message(self.api, message_id) else {
                stats.failures += 1;
                continue;
            };

            let outcome = self.process_message(&message);
            stats.record(&outcome);
            if self.interrupt.is_triggered() {
                stats.interrupted = true;
                break;
            }
        }
        if !stats.interrupted {
            progress(total, total);
        }

        if stats.interrupted {
            tracing::warn!(
                processed = stats.messages_processed,
                artifacts = stats.artifacts_produced,
                "Download interrupted by user"
            );
        } else {
            tracing::info!(
                processed = stats.messages_processed,
                artifacts = stats.artifacts_produced,
                filtered = stats.messages_filtered,
                "Download complete"
            );
        }
        stats
    }

    /// Run a single loaded message through filter, walk, and output.
    pub fn process_message(&self, message: &Message) -> MessageOutcome {
        let mut outcome = MessageOutcome::default();
        let subject = message.subject();

        if !self.options.filters.subject_matches(subject) {
            tracing::info!(message_id = %message.id, subject, "Subject filtered out");
            outcome.filtered = true;
            return outcome;
        }

        let walked = message.payload.as_ref().map(walk).unwrap_or_default();
        outcome.attachments_found = walked.attachments.len();
        tracing::debug!(
            message_id = %message.id,
            attachments = walked.attachments.len(),
            has_text = walked.text.is_some(),
            has_html = walked.html.is_some(),
            "Walked content tree"
        );

        self.download_attachments(message, subject, &walked, &mut outcome);

        let selected = outcome.attachments_found - outcome.attachments_skipped;
        if selected == 0 && self.options.save_body_if_no_attachment && !self.interrupt.is_triggered()
        {
            self.render_body(message, walked, &mut outcome);
        }

        if outcome.artifacts == 0 {
            tracing::debug!(message_id = %message.id, "Message produced no output");
        }
        outcome
    }

    fn download_attachments(
        &self,
        message: &Message,
        subject: &str,
        walked: &WalkResult,
        outcome: &mut MessageOutcome,
    ) {
        for candidate in &walked.attachments {
            if self.interrupt.is_triggered() {
                return;
            }
            if !self.options.filters.filename_matches(&candidate.filename) {
                tracing::debug!(
                    message_id = %message.id,
                    filename = %candidate.filename,
                    "Attachment filtered out"
                );
                outcome.attachments_skipped += 1;
                continue;
            }

            tracing::debug!(
                message_id = %message.id,
                filename = %candidate.filename,
                mime_type = candidate.mime_type.as_deref().unwrap_or("unknown"),
                reported_size = %format_size(candidate.size, BINARY),
                "Downloading attachment"
            );
            let relative =
                self.options
                    .naming
                    .attachment_path(subject, &message.id, &candidate.filename);
            match materialize_attachment(
                self.api,
                &message.id,
                &candidate.attachment_id,
                &self.options.output_dir,
                &relative,
            ) {
                Ok((path, size)) => {
                    tracing::info!(
                        path = %path.display(),
                        size = %format_size(size, BINARY),
                        "Downloaded attachment"
                    );
                    outcome.artifacts += 1;
                }
                Err(e) => {
                    tracing::error!(
                        message_id = %message.id,
                        part_id = candidate.part_id.as_deref().unwrap_or(""),
                        filename = %candidate.filename,
                        error = %e,
                        "Failed to download attachment"
                    );
                    outcome.failures += 1;
                }
            }
        }
    }

    fn render_body(&self, message: &Message, walked: WalkResult, outcome: &mut MessageOutcome) {
        let content = EmailContent::from_message(message, walked.text, walked.html);
        if content.is_empty() {
            tracing::debug!(message_id = %message.id, "No readable body, rendering placeholder");
        }
        match self.renderer.render(
            &content,
            &message.id,
            &self.options.naming,
            &self.options.output_dir,
        ) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Saved message body");
                outcome.artifacts += 1;
                outcome.document_rendered = true;
            }
            Err(DownloadError::RendererUnavailable(reason)) => {
                if !self.unavailable_reported.replace(true) {
                    tracing::warn!(reason = %reason, "Cannot save message bodies in this environment");
                }
            }
            Err(e) => {
                tracing::error!(message_id = %message.id, error = %e, "Failed to save message body");
                outcome.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::error::Result;
    use crate::export::document::HtmlRenderer;
    use crate::filter::FilterCriteria;
    use crate::gmail::api::MessagePage;
    use crate::model::message::{ContentNode, Header, PartBody};
    use crate::naming::NamingPolicy;

    #[derive(Default)]
    struct FakeMailbox {
        messages: Vec<Message>,
        attachments: HashMap<String, String>,
        downloads: RefCell<Vec<String>>,
    }

    impl MailApi for FakeMailbox {
        fn list_messages(&self, _: &str, page_size: usize, _: Option<&str>) -> Result<MessagePage> {
            Ok(MessagePage {
                ids: self.messages.iter().take(page_size).map(|m| m.id.clone()).collect(),
                next_page_token: None,
            })
        }

        fn get_message(&self, message_id: &str) -> Result<Message> {
            self.messages
                .iter()
                .find(|m| m.id == message_id)
                .cloned()
                .ok_or(DownloadError::Api {
                    status: 404,
                    body: "not found".into(),
                })
        }

        fn get_attachment(&self, _: &str, attachment_id: &str) -> Result<String> {
            self.downloads.borrow_mut().push(attachment_id.to_string());
            self.attachments
                .get(attachment_id)
                .cloned()
                .ok_or(DownloadError::Api {
                    status: 500,
                    body: "boom".into(),
                })
        }
    }

    fn message(id: &str, subject: &str, parts: Vec<ContentNode>) -> Message {
        Message {
            id: id.into(),
            payload: Some(ContentNode {
                mime_type: Some("multipart/mixed".into()),
                headers: vec![Header {
                    name: "Subject".into(),
                    value: subject.into(),
                }],
                parts,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn attachment(filename: &str, id: &str) -> ContentNode {
        ContentNode {
            filename: Some(filename.into()),
            body: Some(PartBody {
                attachment_id: Some(id.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn text(data: &str) -> ContentNode {
        ContentNode {
            mime_type: Some("text/plain".into()),
            body: Some(PartBody {
                data: Some(data.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn options(dir: PathBuf, filters: FilterCriteria, save_body: bool) -> RunOptions {
        RunOptions {
            output_dir: dir,
            query: "has:attachment".into(),
            max_messages: 100,
            filters,
            naming: NamingPolicy::new(true),
            save_body_if_no_attachment: save_body,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_subject_filter_skips_whole_message() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message("m1", "Newsletter", vec![attachment("a.pdf", "A")])],
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::new(Some("invoice"), None), true);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let stats = Orchestrator::new(&mailbox, &opts, &renderer).run(&|_, _| {});
        assert_eq!(stats.messages_processed, 1);
        assert_eq!(stats.messages_filtered, 1);
        assert_eq!(stats.artifacts_produced, 0);
        assert!(mailbox.downloads.borrow().is_empty());
    }

    #[test]
    fn test_filename_filter_keeps_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message(
                "m1234567890",
                "Invoice",
                vec![attachment("a.pdf", "A"), attachment("b.png", "B"), attachment("c.pdf", "C")],
            )],
            attachments: HashMap::from([
                ("A".to_string(), "YQ".to_string()),
                ("C".to_string(), "Yw".to_string()),
            ]),
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::new(None, Some(r"\.pdf$")), false);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let stats = Orchestrator::new(&mailbox, &opts, &renderer).run(&|_, _| {});
        assert_eq!(stats.attachments_found, 3);
        assert_eq!(stats.attachments_skipped, 1);
        assert_eq!(stats.artifacts_produced, 2);
        assert_eq!(*mailbox.downloads.borrow(), vec!["A", "C"]);
        assert!(tmp.path().join("Invoice_m1234567/a.pdf").exists());
        assert!(tmp.path().join("Invoice_m1234567/c.pdf").exists());
    }

    #[test]
    fn test_failed_download_does_not_stop_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message(
                "m1",
                "Mixed",
                vec![attachment("bad.bin", "MISSING"), attachment("good.txt", "G")],
            )],
            attachments: HashMap::from([("G".to_string(), "b2s".to_string())]),
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::default(), true);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let stats = Orchestrator::new(&mailbox, &opts, &renderer).run(&|_, _| {});
        assert_eq!(stats.artifacts_produced, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.documents_rendered, 0);
    }

    #[test]
    fn test_all_attachments_filtered_falls_back_to_body() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message(
                "m1",
                "Photos",
                vec![text("aGk"), attachment("img.jpg", "J")],
            )],
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::new(None, Some("pdf")), true);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let stats = Orchestrator::new(&mailbox, &opts, &renderer).run(&|_, _| {});
        assert_eq!(stats.attachments_found, 1);
        assert_eq!(stats.artifacts_produced, 1);
        assert_eq!(stats.documents_rendered, 1);
        assert!(tmp.path().join("Photos_m1/email_content.html").exists());
    }

    #[test]
    fn test_unavailable_renderer_counts_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![
                message("m1", "One", vec![text("aGk")]),
                message("m2", "Two", vec![text("aGk")]),
            ],
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::default(), true);
        let renderer = FallbackRenderer::Unavailable {
            reason: "no converter".into(),
        };
        let orchestrator = Orchestrator::new(&mailbox, &opts, &renderer);
        let stats = orchestrator.run(&|_, _| {});
        assert_eq!(stats.messages_processed, 2);
        assert_eq!(stats.artifacts_produced, 0);
        assert_eq!(stats.failures, 0);
        assert!(orchestrator.unavailable_reported.get());
    }

    #[test]
    fn test_missing_message_not_counted_as_processed() {
        struct Flaky(FakeMailbox);
        impl MailApi for Flaky {
            fn list_messages(&self, q: &str, n: usize, t: Option<&str>) -> Result<MessagePage> {
                let mut page = self.0.list_messages(q, n, t)?;
                page.ids.push("ghost".into());
                Ok(page)
            }
            fn get_message(&self, id: &str) -> Result<Message> {
                self.0.get_message(id)
            }
            fn get_attachment(&self, m: &str, a: &str) -> Result<String> {
                self.0.get_attachment(m, a)
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let api = Flaky(FakeMailbox {
            messages: vec![message("m1", "Hello", vec![])],
            ..Default::default()
        });
        let opts = options(tmp.path().into(), FilterCriteria::default(), false);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let stats = Orchestrator::new(&api, &opts, &renderer).run(&|_, _| {});
        assert_eq!(stats.messages_listed, 2);
        assert_eq!(stats.messages_processed, 1);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_interrupt_during_download_stops_run() {
        struct InterruptOnDownload {
            inner: FakeMailbox,
            interrupt: Interrupt,
            loaded: RefCell<Vec<String>>,
        }
        impl MailApi for InterruptOnDownload {
            fn list_messages(&self, q: &str, n: usize, t: Option<&str>) -> Result<MessagePage> {
                self.inner.list_messages(q, n, t)
            }
            fn get_message(&self, id: &str) -> Result<Message> {
                self.loaded.borrow_mut().push(id.to_string());
                self.inner.get_message(id)
            }
            fn get_attachment(&self, m: &str, a: &str) -> Result<String> {
                self.interrupt.trigger();
                self.inner.get_attachment(m, a)
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let interrupt = Interrupt::new();
        let api = InterruptOnDownload {
            inner: FakeMailbox {
                messages: vec![
                    message("m1", "First", vec![attachment("a.pdf", "A"), attachment("b.pdf", "B")]),
                    message("m2", "Second", vec![attachment("c.pdf", "C"), attachment("d.pdf", "D")]),
                ],
                attachments: HashMap::from([
                    ("A".to_string(), "YQ".to_string()),
                    ("B".to_string(), "Yg".to_string()),
                    ("C".to_string(), "Yw".to_string()),
                    ("D".to_string(), "ZA".to_string()),
                ]),
                ..Default::default()
            },
            interrupt: interrupt.clone(),
            loaded: RefCell::new(Vec::new()),
        };
        let opts = options(tmp.path().into(), FilterCriteria::default(), true);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));

        let stats = Orchestrator::new(&api, &opts, &renderer)
            .with_interrupt(interrupt)
            .run(&|_, _| {});

        assert!(stats.interrupted);
        assert_eq!(stats.messages_processed, 1);
        assert_eq!(stats.artifacts_produced, 1);
        assert_eq!(stats.documents_rendered, 0);
        assert_eq!(*api.inner.downloads.borrow(), vec!["A"]);
        assert_eq!(*api.loaded.borrow(), vec!["m1"]);
        assert!(!tmp.path().join("First_m1/email_content.html").exists());
    }

    #[test]
    fn test_interrupt_skips_body_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message("m1", "Notes", vec![text("aGk")])],
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::default(), true);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let interrupt = Interrupt::new();
        let orchestrator =
            Orchestrator::new(&mailbox, &opts, &renderer).with_interrupt(interrupt.clone());

        interrupt.trigger();
        let outcome = orchestrator.process_message(&mailbox.messages[0]);

        assert_eq!(outcome.attachments_found, 0);
        assert!(!outcome.document_rendered);
        assert_eq!(outcome.artifacts, 0);
        assert!(!tmp.path().join("Notes_m1/email_content.html").exists());
    }

    #[test]
    fn test_pre_triggered_interrupt_stops_before_work() {
        let tmp = tempfile::tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: vec![message("m1", "Hello", vec![attachment("a.txt", "A")])],
            ..Default::default()
        };
        let opts = options(tmp.path().into(), FilterCriteria::default(), false);
        let renderer = FallbackRenderer::Available(Box::new(HtmlRenderer));
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let stats = Orchestrator::new(&mailbox, &opts, &renderer)
            .with_interrupt(interrupt)
            .run(&|_, _| {});
        assert!(stats.interrupted);
        assert_eq!(stats.messages_listed, 1);
        assert_eq!(stats.messages_processed, 0);
    }
}
