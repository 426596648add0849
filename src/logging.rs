//! Human-readable rendering of records for the diagnostic channel.
//!
//! [`DiagnosticLine`] borrows a record and writes it straight into any
//! `fmt::Write` target without building intermediate strings for fields
//! that fit. Every free-text field is bounded and control characters are
//! replaced, so a hostile server message or stack cannot flood or forge
//! lines in the developer console.

use std::borrow::Cow;
use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::record::ErrorRecord;

/// Default maximum length for any individual field in formatted output.
pub const DEFAULT_MAX_FIELD_LEN: usize = 1024;

/// Truncation indicator appended to truncated strings
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Structured view of one record for diagnostic output.
///
/// # Example
///
/// ```rust
/// # use fsm_error_log::{ErrorLogService, logging::DiagnosticLine};
/// let service = ErrorLogService::builder().build();
/// let record = service.log_auth_error("token expired", "Please log in again.", None);
/// let line = DiagnosticLine::new(&record).to_string();
/// assert!(line.starts_with("[HIGH/AUTHENTICATION]"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticLine<'a> {
    record: &'a ErrorRecord,
    max_field_len: usize,
}

impl<'a> DiagnosticLine<'a> {
    pub fn new(record: &'a ErrorRecord) -> Self {
        Self {
            record,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    /// Override the per-field bound (minimum: the indicator length + 1).
    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len.max(TRUNCATION_INDICATOR.len() + 1);
        self
    }

    /// Bounded, sanitized text of one field.
    pub fn field<'s>(&self, value: &'s str) -> Cow<'s, str> {
        bounded(value, self.max_field_len)
    }

    /// Write the group header and every present field.
    ///
    /// Format:
    /// `[SEVERITY/TYPE] id=... message='...' user_message='...' component='...' action='...' metadata=... stack='...'`
    pub fn write_to(&self, f: &mut impl fmt::Write) -> fmt::Result {
        let r = self.record;
        write!(
            f,
            "[{}/{}] id={} message='{}' user_message='{}'",
            r.severity(),
            r.error_type(),
            r.id(),
            self.field(r.message()),
            self.field(r.user_message()),
        )?;

        if let Some(component) = r.component() {
            write!(f, " component='{}'", self.field(component))?;
        }
        if let Some(action) = r.action() {
            write!(f, " action='{}'", self.field(action))?;
        }
        if let Some(metadata) = r.metadata() {
            let rendered = serde_json::to_string(metadata).unwrap_or_else(|_| "<unserializable>".into());
            write!(f, " metadata={}", self.field(&rendered))?;
        }
        if let Some(stack) = r.stack() {
            write!(f, " stack='{}'", self.field(stack))?;
        }

        Ok(())
    }
}

impl fmt::Display for DiagnosticLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

/// Install a `tracing` fmt subscriber for the diagnostic channel.
///
/// `RUST_LOG` takes precedence over `default_filter`. Returns `false` when a
/// global subscriber is already installed, which is normal in tests.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Neutralize control characters and cap length at a UTF-8 boundary.
///
/// Borrowed when nothing needs changing.
fn bounded(s: &str, max_len: usize) -> Cow<'_, str> {
    let clean = if s.chars().any(char::is_control) {
        Cow::Owned(s.chars().map(|c| if c.is_control() { '?' } else { c }).collect::<String>())
    } else {
        Cow::Borrowed(s)
    };

    if clean.len() <= max_len {
        return clean;
    }

    let max_content_len = max_len.saturating_sub(TRUNCATION_INDICATOR.len());
    let mut idx = max_content_len;
    while idx > 0 && !clean.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&clean[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}
