//! Render a message body as a standalone document when it has no attachments.
//!
//! The HTML document is always built in-process. Turning it into the final
//! artifact is delegated to a [`DocumentRenderer`]: written as-is for HTML,
//! or piped through `wkhtmltopdf` for PDF. Which one applies is decided once
//! per run by [`resolve_renderer`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::BodyFormat;
use crate::error::{DownloadError, Result};
use crate::model::content::EmailContent;
use crate::naming::NamingPolicy;

/// External HTML-to-PDF converter looked up on `PATH`.
pub const PDF_CONVERTER: &str = "wkhtmltopdf";

/// Turns an HTML document into a file.
pub trait DocumentRenderer {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Extension (without dot) of the produced file.
    fn extension(&self) -> &'static str;

    /// Render `html` into `dest`. Parent directories already exist.
    fn render(&self, html: &str, dest: &Path) -> Result<()>;
}

/// Writes the HTML document unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl DocumentRenderer for HtmlRenderer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, html: &str, dest: &Path) -> Result<()> {
        std::fs::write(dest, html).map_err(|e| DownloadError::io(dest, e))
    }
}

/// Converts the HTML document to PDF with an external program.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    program: PathBuf,
}

impl PdfRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DocumentRenderer for PdfRenderer {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, html: &str, dest: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(["--quiet", "--encoding", "utf-8", "-"])
            .arg(dest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DownloadError::io(&self.program, e))?;

        // Stdin is dropped before waiting so the converter sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(html.as_bytes()),
            None => Ok(()),
        };

        // Always reap the child; its exit status and stderr explain a failed write.
        let output = child
            .wait_with_output()
            .map_err(|e| DownloadError::io(&self.program, e))?;
        if !output.status.success() {
            return Err(DownloadError::Render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written.map_err(|e| DownloadError::io(&self.program, e))
    }
}

/// Fallback rendering capability, resolved once at startup.
pub enum FallbackRenderer {
    Available(Box<dyn DocumentRenderer>),
    Unavailable { reason: String },
}

impl std::fmt::Debug for FallbackRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(r) => write!(f, "Available({})", r.name()),
            Self::Unavailable { reason } => write!(f, "Unavailable({reason})"),
        }
    }
}

impl FallbackRenderer {
    /// Build the document for `content` and write it at the naming policy's
    /// fallback path. Returns the written path.
    pub fn render(
        &self,
        content: &EmailContent,
        message_id: &str,
        policy: &NamingPolicy,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let renderer = match self {
            Self::Available(r) => r,
            Self::Unavailable { reason } => {
                return Err(DownloadError::RendererUnavailable(reason.clone()))
            }
        };

        let relative = policy.document_path(&content.subject, message_id, renderer.extension());
        let path = output_dir.join(&relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
        }
        renderer.render(&build_document(content), &path)?;
        Ok(path)
    }
}

/// Pick the renderer for `format`. PDF needs `wkhtmltopdf` on `PATH`.
pub fn resolve_renderer(format: BodyFormat) -> FallbackRenderer {
    match format {
        BodyFormat::Html => FallbackRenderer::Available(Box::new(HtmlRenderer)),
        BodyFormat::Pdf => match which::which(PDF_CONVERTER) {
            Ok(program) => {
                tracing::debug!(program = %program.display(), "Found PDF converter");
                FallbackRenderer::Available(Box::new(PdfRenderer::new(program)))
            }
            Err(e) => {
                let reason = format!("{PDF_CONVERTER} not found on PATH ({e})");
                tracing::debug!(reason = %reason, "PDF rendering unavailable");
                FallbackRenderer::Unavailable { reason }
            }
        },
    }
}

/// Escape text for safe embedding in HTML element content and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Convert plain text to markup: escape, then turn line breaks into `<br>`.
pub fn text_to_html(text: &str) -> String {
    escape_html(&text.replace("\r\n", "\n")).replace('\n', "<br>\n")
}

/// Body markup: HTML verbatim when present, else converted plain text.
fn body_markup(content: &EmailContent) -> String {
    match (&content.html, &content.text) {
        (Some(html), _) => html.clone(),
        (None, Some(text)) => text_to_html(text),
        (None, None) => "<p><em>(This message has no readable body.)</em></p>".to_string(),
    }
}

const DOCUMENT_STYLE: &str = "\
body { font-family: Arial, Helvetica, sans-serif; margin: 24px; color: #222; }
.header { border-bottom: 2px solid #444; padding-bottom: 12px; margin-bottom: 20px; }
.header h1 { font-size: 20px; margin: 0 0 12px 0; }
.meta { border-collapse: collapse; font-size: 13px; }
.meta td { padding: 2px 12px 2px 0; vertical-align: top; }
.meta td.label { font-weight: bold; color: #555; white-space: nowrap; }
.content { font-size: 14px; line-height: 1.5; word-wrap: break-word; }";

/// Wrap a message's metadata and body in the fixed document template.
pub fn build_document(content: &EmailContent) -> String {
    let subject = escape_html(&content.subject);
    let from = escape_html(&content.from);
    let to = escape_html(&content.to);
    let date = escape_html(&content.date);
    let body = body_markup(content);

    format!(
        "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<title>{subject}</title>
<style>
{DOCUMENT_STYLE}
</style>
</head>
<body>
<div class=\"header\">
<h1>{subject}</h1>
<table class=\"meta\">
<tr><td class=\"label\">From:</td><td>{from}</td></tr>
<tr><td class=\"label\">To:</td><td>{to}</td></tr>
<tr><td class=\"label\">Date:</td><td>{date}</td></tr>
</table>
</div>
<div class=\"content\">
{body}
</div>
</body>
</html>
"
    )
}
