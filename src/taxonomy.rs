//! Fixed error vocabulary: what kind of failure happened and how urgent it is.
//!
//! # Taxonomy
//!
//! | Type             | Typical cause                           | Default severity |
//! |------------------|-----------------------------------------|------------------|
//! | `Network`        | connectivity or HTTP failures           | High (404: Low)  |
//! | `Authentication` | 401/403 responses                       | High             |
//! | `Validation`     | 422 responses, caller-declared input    | Low              |
//! | `BusinessLogic`  | caller-declared domain-rule violations  | Medium           |
//! | `System`         | uncategorized failures, fallback        | Medium           |
//! | `UserInput`      | caller-declared raw input problems      | (caller chooses) |
//!
//! No classification rule produces `UserInput`; callers request it explicitly.
//!
//! Severity is advisory. It picks the diagnostic log level and nothing else,
//! so it must never decide whether a message is shown to the user.
//!
//! Both enums serialize as `SCREAMING_SNAKE_CASE` (`BUSINESS_LOGIC`, `HIGH`)
//! to match the labels the console front end already displays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of failure an [`ErrorRecord`](crate::ErrorRecord) describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// Connectivity or HTTP failures
    Network,
    /// Session or permission failures
    Authentication,
    /// Input rejected by a validation rule
    Validation,
    /// Domain rule violations declared by the caller
    BusinessLogic,
    /// Anything that could not be classified more precisely
    #[default]
    System,
    /// Raw input problems declared by the caller
    UserInput,
}

impl ErrorType {
    /// Every type, in declaration order.
    pub const ALL: [ErrorType; 6] = [
        Self::Network,
        Self::Authentication,
        Self::Validation,
        Self::BusinessLogic,
        Self::System,
        Self::UserInput,
    ];

    /// Wire label, identical to the serialized form.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Authentication => "AUTHENTICATION",
            Self::Validation => "VALIDATION",
            Self::BusinessLogic => "BUSINESS_LOGIC",
            Self::System => "SYSTEM",
            Self::UserInput => "USER_INPUT",
        }
    }

    /// Severity assigned when a caller names the type but not the severity.
    #[inline]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::Network | Self::Authentication => Severity::High,
            Self::Validation => Severity::Low,
            Self::BusinessLogic | Self::System | Self::UserInput => Severity::Medium,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel::new("error type", s))
    }
}

/// Advisory urgency of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Expected, user-recoverable failures
    Low,
    /// Default for unclassified failures
    #[default]
    Medium,
    /// Failures that block the current workflow
    High,
    /// Failures that need immediate operator attention
    Critical,
}

impl Severity {
    /// Every severity, lowest first.
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLabel::new("severity", s))
    }
}

/// A label that is not part of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} label: '{label}'")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

impl UnknownLabel {
    fn new(kind: &'static str, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
        }
    }
}
