//! Classification engine: raw failure + context → complete [`ErrorDetails`].
//!
//! Rules are applied in priority order and the first match wins:
//!
//! 1. HTTP response with a status code → by status (401/403 auth, 404 and
//!    5xx network, 422 validation, 429 rate limit, anything else network)
//! 2. Request sent, nothing came back → `Network` / `High`
//! 3. Error object → `System` / `Medium`, message and stack preserved
//! 4. Plain string → `System` / `Medium`, the string is the message
//! 5. Anything else → `System` / `Medium`, generic message
//!
//! Classification is total. Every input, however malformed, yields details
//! that the service can turn into a record.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::io;

use serde_json::Value;

use crate::record::{ErrorDetails, Metadata, UNKNOWN_ERROR_MESSAGE};
use crate::taxonomy::{ErrorType, Severity};

/// End-user wording attached by the classification rules.
pub mod user_messages {
    pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
    pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
    pub const NOT_FOUND: &str = "The requested resource was not found.";
    pub const INVALID_INPUT: &str = "Please check your input and try again.";
    pub const RATE_LIMITED: &str = "Too many requests. Please wait a moment and try again.";
    pub const SERVER_ERROR: &str = "A server error occurred. Please try again later.";
    pub const CONNECTIVITY: &str =
        "Unable to connect to the server. Please check your internet connection.";
    pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again.";
}

/// Provenance and user-message override supplied by the call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub component: Option<String>,
    pub action: Option<String>,
    /// Replaces the rule's user-facing wording when set.
    pub user_message: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context naming the collaborator and the operation it was running.
    pub fn at(component: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            action: Some(action.into()),
            user_message: None,
        }
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
    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = Some(user_message.into());
        self
    }

    fn user_message_or(&self, fallback: &str) -> String {
        self.user_message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// HTTP-shaped rejection: either a response with a status or a request
/// that never got one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpFailure {
    /// Status of the response, `None` when no status could be read
    pub status: Option<u16>,
    /// Whether a response arrived at all
    pub responded: bool,
    pub method: Option<String>,
    pub url: Option<String>,
    /// Decoded response body
    pub body: Option<Value>,
    /// Client-side description of the failure
    pub message: Option<String>,
}

impl HttpFailure {
    /// A response came back with `status`.
    pub fn response(status: u16) -> Self {
        Self {
            status: Some(status),
            responded: true,
            ..Self::default()
        }
    }

    /// The request was sent but no response arrived.
    pub fn no_response() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Human text the backend put in the body (`detail` or `error`).
    fn body_detail(&self) -> Option<&str> {
        let body = self.body.as_ref()?;
        match body {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => ["detail", "error", "message"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        }
    }

    fn request_label(&self) -> String {
        match (self.method.as_deref(), self.url.as_deref()) {
            (Some(m), Some(u)) => format!("{} {}", m.to_ascii_uppercase(), u),
            (None, Some(u)) => u.to_string(),
            (Some(m), None) => m.to_ascii_uppercase(),
            (None, None) => String::new(),
        }
    }

    fn request_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        if let Some(status) = self.status {
            meta.insert("status".into(), Value::from(status));
        }
        if let Some(method) = &self.method {
            meta.insert("method".into(), Value::from(method.to_ascii_uppercase()));
        }
        if let Some(url) = &self.url {
            meta.insert("url".into(), Value::from(url.as_str()));
        }
        if let Some(body) = &self.body {
            meta.insert("responseBody".into(), body.clone());
        }
        meta
    }
}

/// Anything a collaborator can hand to
/// [`ErrorLogService::handle_error`](crate::ErrorLogService::handle_error).
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// HTTP-shaped rejection
    Http(HttpFailure),
    /// Generic error object
    Exception {
        name: Option<String>,
        message: String,
        stack: Option<String>,
    },
    /// Bare string
    Message(String),
    /// Already-structured partial record
    Structured(ErrorDetails),
    /// Loosely shaped value, probed like a thrown JS object
    Json(Value),
    /// Nothing recognizable
    Unknown,
}

impl RawFailure {
    /// Capture any error, keeping its source chain as the stack.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut chain = String::new();
        let mut source = error.source();
        while let Some(cause) = source {
            if !chain.is_empty() {
                chain.push('\n');
            }
            let _ = write!(chain, "caused by: {cause}");
            source = cause.source();
        }

        Self::Exception {
            name: None,
            message: error.to_string(),
            stack: (!chain.is_empty()).then_some(chain),
        }
    }

    /// Error object with a type name, as produced by a panic or a named error.
    pub fn exception(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception {
            name: Some(name.into()),
            message: message.into(),
            stack: None,
        }
    }
}

impl From<HttpFailure> for RawFailure {
    fn from(value: HttpFailure) -> Self {
        Self::Http(value)
    }
}

impl From<ErrorDetails> for RawFailure {
    fn from(value: ErrorDetails) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for RawFailure {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for RawFailure {
    fn from(value: &str) -> Self {
        Self::Message(value.to_string())
    }
}

impl From<Value> for RawFailure {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<io::Error> for RawFailure {
    fn from(value: io::Error) -> Self {
        Self::Exception {
            name: Some(format!("io::{:?}", value.kind())),
            message: value.to_string(),
            stack: None,
        }
    }
}

impl From<serde_json::Error> for RawFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::Exception {
            name: Some("serde_json::Error".to_string()),
            message: value.to_string(),
            stack: None,
        }
    }
}

impl From<Box<dyn StdError + Send + Sync>> for RawFailure {
    fn from(value: Box<dyn StdError + Send + Sync>) -> Self {
        Self::from_error(value.as_ref())
    }
}

/// Apply the classification rules.
pub fn classify(raw: RawFailure, context: &ErrorContext) -> ErrorDetails {
    let details = match raw {
        RawFailure::Http(http) => classify_http(&http, context),
        RawFailure::Exception {
            name,
            message,
            stack,
        } => classify_exception(name, message, stack, context),
        RawFailure::Message(message) => ErrorDetails::new(message, context.user_message_or(user_messages::UNEXPECTED))
            .with_type(ErrorType::System)
            .with_severity(Severity::Medium),
        RawFailure::Structured(details) => complete_structured(details, context),
        RawFailure::Json(value) => return classify(probe_json(value), context),
        RawFailure::Unknown => ErrorDetails::new(
            UNKNOWN_ERROR_MESSAGE,
            context.user_message_or(user_messages::UNEXPECTED),
        )
        .with_type(ErrorType::System)
        .with_severity(Severity::Medium),
    };

    attach_provenance(details, context)
}

fn classify_http(http: &HttpFailure, context: &ErrorContext) -> ErrorDetails {
    let request = http.request_label();

    // A numeric status means a response arrived, whatever `responded` says.
    if !http.responded && http.status.is_none() {
        let mut message = String::from("Network request failed: no response received");
        if !request.is_empty() {
            let _ = write!(message, " ({request})");
        }
        if let Some(client) = http.message.as_deref() {
            let _ = write!(message, ": {client}");
        }
        return ErrorDetails::new(message, context.user_message_or(user_messages::CONNECTIVITY))
            .with_type(ErrorType::Network)
            .with_severity(Severity::High)
            .with_metadata_map(http.request_metadata());
    }

    let (error_type, severity, wording) = match http.status {
        Some(401) => (ErrorType::Authentication, Severity::High, user_messages::SESSION_EXPIRED),
        Some(403) => (ErrorType::Authentication, Severity::High, user_messages::PERMISSION_DENIED),
        Some(404) => (ErrorType::Network, Severity::Low, user_messages::NOT_FOUND),
        Some(422) => (ErrorType::Validation, Severity::Low, user_messages::INVALID_INPUT),
        Some(429) => (ErrorType::Network, Severity::Medium, user_messages::RATE_LIMITED),
        Some(s) if s >= 500 => (ErrorType::Network, Severity::High, user_messages::SERVER_ERROR),
        _ => (ErrorType::Network, Severity::Medium, user_messages::UNEXPECTED),
    };

    let mut message = match http.status {
        Some(status) => format!("HTTP {status}"),
        None => String::from("HTTP response without status"),
    };
    if !request.is_empty() {
        let _ = write!(message, " {request}");
    }
    if let Some(detail) = http.body_detail().or(http.message.as_deref()) {
        let _ = write!(message, ": {detail}");
    }

    ErrorDetails::new(message, context.user_message_or(wording))
        .with_type(error_type)
        .with_severity(severity)
        .with_metadata_map(http.request_metadata())
}

fn classify_exception(
    name: Option<String>,
    message: String,
    stack: Option<String>,
    context: &ErrorContext,
) -> ErrorDetails {
    let mut details = ErrorDetails::new(message, context.user_message_or(user_messages::UNEXPECTED))
        .with_type(ErrorType::System)
        .with_severity(Severity::Medium);
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        details = details.with_metadata("name", name);
    }
    details.stack = stack;
    details
}

fn complete_structured(mut details: ErrorDetails, context: &ErrorContext) -> ErrorDetails {
    if details.user_message.trim().is_empty() {
        details.user_message = context.user_message_or(user_messages::UNEXPECTED);
    } else if let Some(over) = context.user_message.as_deref().filter(|m| !m.trim().is_empty()) {
        details.user_message = over.to_string();
    }
    details
}

/// Copy context provenance onto details that do not carry their own.
fn attach_provenance(mut details: ErrorDetails, context: &ErrorContext) -> ErrorDetails {
    if details.component.is_none() {
        details.component.clone_from(&context.component);
    }
    if details.action.is_none() {
        details.action.clone_from(&context.action);
    }
    details
}

/// Read a loosely shaped value the way a thrown JS object is inspected.
fn probe_json(value: Value) -> RawFailure {
    let map = match value {
        Value::Object(map) => map,
        Value::String(s) => return RawFailure::Message(s),
        Value::Null => return RawFailure::Unknown,
        other => return RawFailure::Message(other.to_string()),
    };

    let string_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(response) = map.get("response").filter(|r| !r.is_null()) {
        let config = map.get("config");
        let method = config
            .and_then(|c| c.get("method"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let url = config
            .and_then(|c| c.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return RawFailure::Http(HttpFailure {
            status: response
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
            responded: true,
            method,
            url,
            body: response.get("data").cloned(),
            message: string_field("message"),
        });
    }

    if map.get("request").is_some_and(|r| !r.is_null()) {
        let config = map.get("config");
        return RawFailure::Http(HttpFailure {
            status: None,
            responded: false,
            method: config
                .and_then(|c| c.get("method"))
                .and_then(Value::as_str)
                .map(str::to_string),
            url: config
                .and_then(|c| c.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string),
            body: None,
            message: string_field("message"),
        });
    }

    if let Some(message) = string_field("message") {
        return RawFailure::Exception {
            name: string_field("name"),
            message,
            stack: string_field("stack"),
        };
    }

    RawFailure::Unknown
}
