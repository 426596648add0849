//! Side channel for logged records.
//!
//! The service hands every new record to exactly one [`ErrorSink`], chosen by
//! the composition root:
//!
//! - [`ConsoleSink`]: development diagnostics through `tracing`
//! - [`TelemetrySink`]: production hand-off to a remote collector (stub)
//! - [`NoopSink`]: tests and silent deployments
//!
//! The contract is fire-and-forget. A sink may fail or even panic; the
//! service catches both and never lets them reach the caller of `log_error`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::logging::{DEFAULT_MAX_FIELD_LEN, DiagnosticLine};
use crate::record::ErrorRecord;
use crate::subscribers::SubscriberFailure;
use crate::taxonomy::Severity;

/// `tracing` target used by the diagnostic channel.
pub const DIAGNOSTIC_TARGET: &str = "fsm_error_log";

/// Failures a sink may report. The service swallows them.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The collector refused the record.
    #[error("sink rejected record: {reason}")]
    Rejected { reason: String },
    /// The outbox has no room left.
    #[error("telemetry outbox full ({capacity} pending)")]
    OutboxFull { capacity: usize },
    /// The record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Delivery target for records.
pub trait ErrorSink: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    /// Accept one record. Best effort; errors are logged and dropped.
    fn deliver(&self, record: &ErrorRecord) -> Result<(), SinkError>;

    /// A subscriber panicked while handling `record`.
    fn subscriber_failed(&self, record: &ErrorRecord, failure: &SubscriberFailure) {
        let _ = (record, failure);
    }
}

/// Development sink: one `tracing` event per record, level by severity.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    max_field_len: usize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    pub fn with_max_field_len(mut self, max_field_len: usize) -> Self {
        self.max_field_len = max_field_len;
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn deliver(&self, record: &ErrorRecord) -> Result<(), SinkError> {
        let line = DiagnosticLine::new(record).with_max_field_len(self.max_field_len);
        let id = record.id().as_str();
        let error_type = record.error_type().as_str();
        let component = record.component().unwrap_or("-");
        let action = record.action().unwrap_or("-");

        match record.severity() {
            Severity::Low => info!(
                target: DIAGNOSTIC_TARGET,
                id, error_type, component, action, "{line}"
            ),
            Severity::Medium => warn!(
                target: DIAGNOSTIC_TARGET,
                id, error_type, component, action, "{line}"
            ),
            Severity::High | Severity::Critical => error!(
                target: DIAGNOSTIC_TARGET,
                id, error_type, component, action, severity = record.severity().as_str(), "{line}"
            ),
        }

        Ok(())
    }

    fn subscriber_failed(&self, record: &ErrorRecord, failure: &SubscriberFailure) {
        warn!(
            target: DIAGNOSTIC_TARGET,
            id = record.id().as_str(),
            subscriber = %failure.subscriber,
            panic = %failure.message,
            "error subscriber panicked"
        );
    }
}

/// Production sink stub.
///
/// Serializes each record to JSON and queues it in a bounded outbox that a
/// transport task would drain. No network I/O happens here.
#[derive(Debug)]
pub struct TelemetrySink {
    endpoint: String,
    capacity: usize,
    outbox: Mutex<VecDeque<String>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl TelemetrySink {
    pub fn new(endpoint: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            endpoint: endpoint.into(),
            capacity,
            outbox: Mutex::new(VecDeque::with_capacity(capacity)),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn lock_outbox(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        match self.outbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Take every queued payload, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.lock_outbox().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.lock_outbox().len()
    }

    /// Payloads accepted since construction.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Payloads refused because the outbox was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ErrorSink for TelemetrySink {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn deliver(&self, record: &ErrorRecord) -> Result<(), SinkError> {
        let payload = serde_json::to_string(record)?;

        let mut outbox = self.lock_outbox();
        if outbox.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::OutboxFull {
                capacity: self.capacity,
            });
        }
        outbox.push_back(payload);
        self.delivered.fetch_add(1, Ordering::Relaxed);

        debug!(
            target: DIAGNOSTIC_TARGET,
            id = record.id().as_str(),
            endpoint = %self.endpoint,
            "queued error report"
        );
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ErrorSink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    fn deliver(&self, _record: &ErrorRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ErrorDetails;
    use crate::taxonomy::ErrorType;

    fn record(severity: Severity) -> ErrorRecord {
        ErrorRecord::from_details(
            ErrorDetails::new("job not found", "The job was not found.")
                .with_type(ErrorType::Network)
                .with_severity(severity),
        )
    }

    #[test]
    fn console_sink_accepts_every_severity() {
        let sink = ConsoleSink::new();
        for severity in Severity::ALL {
            assert!(sink.deliver(&record(severity)).is_ok());
        }
        assert_eq!(sink.name(), "console");
    }

    #[test]
    fn telemetry_sink_queues_json_payloads() {
        let sink = TelemetrySink::new("https://telemetry.invalid/errors", 4);
        let rec = record(Severity::High);
        sink.deliver(&rec).unwrap();

        assert_eq!(sink.pending(), 1);
        assert_eq!(sink.delivered(), 1);

        let payloads = sink.drain();
        let value: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(value["id"], rec.id().as_str());
        assert_eq!(value["type"], "NETWORK");
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn telemetry_sink_refuses_when_full() {
        let sink = TelemetrySink::new("stub", 2);
        sink.deliver(&record(Severity::Low)).unwrap();
        sink.deliver(&record(Severity::Low)).unwrap();

        let err = sink.deliver(&record(Severity::Low)).unwrap_err();
        assert!(matches!(err, SinkError::OutboxFull { capacity: 2 }));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(sink.pending(), 2);
    }

    #[test]
    fn noop_sink_accepts_everything() {
        assert!(NoopSink.deliver(&record(Severity::Critical)).is_ok());
    }

    #[test]
    fn sink_error_messages() {
        let err = SinkError::Rejected {
            reason: "quota".into(),
        };
        assert_eq!(err.to_string(), "sink rejected record: quota");
    }
}
