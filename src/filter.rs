//! Subject and filename filtering with case-insensitive regular expressions.
//!
//! A pattern is searched anywhere in the input (not anchored). An empty or
//! absent pattern matches everything. A pattern that fails to compile never
//! raises: it is logged and treated as matching nothing.

use regex::{Regex, RegexBuilder};

use crate::error::{DownloadError, Result};

/// Compile `pattern` as a case-insensitive search expression.
pub fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| DownloadError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// One optional filter expression, compiled once per run.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// No filtering.
    Any,
    /// A valid expression.
    Regex(Regex),
    /// An expression that failed to compile. Matches nothing.
    Invalid { pattern: String, reason: String },
}

impl Pattern {
    /// Build a pattern from optional user input. Absent or empty input means
    /// [`Pattern::Any`]; anything else is compiled exactly as given.
    pub fn new(pattern: Option<&str>) -> Self {
        match pattern.filter(|p| !p.is_empty()) {
            None => Self::Any,
            Some(p) => match compile(p) {
                Ok(re) => Self::Regex(re),
                Err(e) => {
                    tracing::warn!(pattern = p, error = %e, "Invalid filter expression");
                    Self::Invalid {
                        pattern: p.to_string(),
                        reason: e.to_string(),
                    }
                }
            },
        }
    }

    /// Whether `haystack` passes this filter.
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Regex(re) => re.is_match(haystack),
            Self::Invalid { pattern, .. } => {
                tracing::debug!(pattern = %pattern, "Invalid filter expression excludes input");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Any)
    }
}

/// The two independent filters applied during a run.
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    pub subject: Pattern,
    pub filename: Pattern,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            subject: Pattern::Any,
            filename: Pattern::Any,
        }
    }
}

impl FilterCriteria {
    pub fn new(subject_regex: Option<&str>, filename_regex: Option<&str>) -> Self {
        Self {
            subject: Pattern::new(subject_regex),
            filename: Pattern::new(filename_regex),
        }
    }

    /// Applied once per message, before any attachment is touched.
    pub fn subject_matches(&self, subject: &str) -> bool {
        self.subject.is_match(subject)
    }

    /// Applied to each attachment candidate independently.
    pub fn filename_matches(&self, filename: &str) -> bool {
        self.filename.is_match(filename)
    }
}

/// One-shot subject check against an uncompiled pattern.
pub fn subject_matches(subject: &str, pattern: &str) -> bool {
    Pattern::new(Some(pattern)).is_match(subject)
}

/// One-shot filename check against an uncompiled pattern.
pub fn filename_matches(filename: &str, pattern: &str) -> bool {
    Pattern::new(Some(pattern)).is_match(filename)
}
