//! # FSM Error Log
//!
//! Centralized error classification, logging and propagation control for a
//! field-service management client.
//!
//! ## Design Philosophy
//!
//! 1. **Every failure becomes one record** with a type, a severity, a
//!    developer message and a message safe to show the end user
//! 2. **Classification is total**: HTTP failures, raised errors, bare
//!    strings, structured details and loosely shaped JSON all map to a record
//! 3. **The service is the end of the chain**: nothing it does returns an
//!    error or lets a sink or subscriber panic escape
//! 4. **History is bounded**: the newest records are kept in a fixed-size
//!    buffer, oldest evicted first
//! 5. **Side channels are injected**: console diagnostics, telemetry or
//!    nothing, picked by the composition root
//!
//! ## Quick Start
//!
//! ```rust
//! use fsm_error_log::{ErrorContext, ErrorFilter, ErrorLogService, ErrorType, HttpFailure};
//!
//! let service = ErrorLogService::builder().capacity(50).build();
//!
//! let record = service.handle_error(
//!     HttpFailure::response(401).with_request("GET", "/api/jobs/"),
//!     &ErrorContext::at("JobList", "load"),
//! );
//!
//! assert_eq!(record.error_type(), ErrorType::Authentication);
//! assert_eq!(record.user_message(), "Your session has expired. Please log in again.");
//!
//! let auth_errors = service.get_errors(&ErrorFilter::new().with_type(ErrorType::Authentication));
//! assert_eq!(auth_errors.len(), 1);
//! ```
//!
//! ## Subscribing
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use fsm_error_log::{ErrorLogService, Severity};
//!
//! let service = ErrorLogService::builder().build();
//! let toasts = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&toasts);
//! let subscription = service.on_error(move |record| {
//!     if record.severity() >= Severity::High {
//!         sink.lock().unwrap().push(record.user_message().to_string());
//!     }
//! });
//!
//! service.log_network_error("socket closed", "Connection lost.", None);
//! service.log_validation_error("zip too short", "Check the postcode.", None);
//! subscription.unsubscribe();
//!
//! assert_eq!(*toasts.lock().unwrap(), vec!["Connection lost.".to_string()]);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use fsm_error_log::{ErrorLogService, ServiceConfig};
//!
//! let config = ServiceConfig::from_json(r#"{"mode": "silent", "history_capacity": 10}"#).unwrap();
//! let service = ErrorLogService::from_config(&config).unwrap();
//! assert_eq!(service.capacity(), 10);
//! ```

#![warn(clippy::all)]

pub mod classify;
pub mod combinators;
pub mod config;
pub mod history;
pub mod id;
pub mod logging;
pub mod record;
pub mod service;
pub mod sink;
pub mod subscribers;
pub mod taxonomy;

pub use classify::{ErrorContext, HttpFailure, RawFailure, classify, user_messages};
pub use combinators::{
    GuardedAsyncFn, GuardedFn, Outcome, ResultExt, with_error_handling, with_sync_error_handling,
};
pub use config::{ConfigError, RunMode, ServiceConfig, TelemetryConfig};
pub use history::{DEFAULT_CAPACITY, ErrorFilter, ErrorStats};
pub use id::RecordId;
pub use logging::{DiagnosticLine, init_tracing};
pub use record::{ErrorDetails, ErrorRecord, Metadata};
pub use service::{ErrorLogService, ErrorLogServiceBuilder};
pub use sink::{ConsoleSink, ErrorSink, NoopSink, SinkError, TelemetrySink};
pub use subscribers::{SubscriberFailure, SubscriberId, Subscription};
pub use taxonomy::{ErrorType, Severity, UnknownLabel};
