//! The error record and the partial input it is built from.
//!
//! [`ErrorDetails`] is what callers hand to
//! [`ErrorLogService::log_error`](crate::ErrorLogService::log_error): every
//! field except the two messages is optional. The service completes it into an
//! [`ErrorRecord`], which is frozen from then on. Records are shared as
//! `Arc<ErrorRecord>` between the history, the sink and subscribers, and no
//! method hands out mutable access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::user_messages;
use crate::id::RecordId;
use crate::taxonomy::{ErrorType, Severity};

/// Open-ended structured payload attached to a record.
pub type Metadata = serde_json::Map<String, Value>;

/// Diagnostic message used when a caller supplies an empty one.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Partial record accepted by the logging entry points.
///
/// # Example
///
/// ```rust
/// use fsm_error_log::{ErrorDetails, ErrorType, Severity};
///
/// let details = ErrorDetails::new("invoice 42 has no line items", "Add at least one line item.")
///     .with_type(ErrorType::BusinessLogic)
///     .with_severity(Severity::Medium)
///     .with_component("InvoiceForm")
///     .with_action("submit")
///     .with_metadata("invoiceId", 42);
/// assert_eq!(details.error_type, Some(ErrorType::BusinessLogic));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Diagnostic description
    #[serde(default)]
    pub message: String,
    /// Text safe to show to an end user
    #[serde(default)]
    pub user_message: String,
    /// Taxonomy kind, `System` when absent
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Urgency, `Medium` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Collaborator that raised the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Operation the collaborator was performing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_message: user_message.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    #[inline]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[inline]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[inline]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[inline]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Add one metadata entry, replacing any previous value under `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Merge a whole metadata map. Existing keys are overwritten.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        match self.metadata.as_mut() {
            Some(existing) => existing.extend(metadata),
            None => self.metadata = Some(metadata),
        }
        self
    }
}

/// One classified failure. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    id: RecordId,
    #[serde(rename = "type")]
    error_type: ErrorType,
    severity: Severity,
    message: String,
    user_message: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

impl ErrorRecord {
    /// Complete partial details into a record, stamping id and timestamp.
    ///
    /// Total: empty messages are replaced, missing type and severity fall
    /// back to `System` and `Medium`.
    pub(crate) fn from_details(details: ErrorDetails) -> Self {
        let ErrorDetails {
            message,
            user_message,
            error_type,
            severity,
            component,
            action,
            metadata,
            stack,
        } = details;

        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        let user_message = if user_message.trim().is_empty() {
            user_messages::UNEXPECTED.to_string()
        } else {
            user_message
        };

        Self {
            id: RecordId::generate(),
            error_type: error_type.unwrap_or_default(),
            severity: severity.unwrap_or_default(),
            message,
            user_message,
            timestamp: Utc::now(),
            component: component.filter(|c| !c.is_empty()),
            action: action.filter(|a| !a.is_empty()),
            metadata: metadata.filter(|m| !m.is_empty()),
            stack,
        }
    }

    #[inline]
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    #[inline]
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Diagnostic message. Not meant for end users.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message safe to render in the UI.
    #[inline]
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[inline]
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[inline]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Single metadata value, if present.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    #[inline]
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}
