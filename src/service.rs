//! The error log service.
//!
//! One instance is built at application start and shared (by reference or
//! `Arc`) with every collaborator. It is the terminal point of the error
//! chain: none of its operations return an error or let a panic escape from
//! the sink or a subscriber.
//!
//! # Logging sequence
//!
//! 1. complete the details into a frozen [`ErrorRecord`]
//! 2. append to history, evicting the oldest record when full
//! 3. hand the record to the sink (failures swallowed)
//! 4. notify a snapshot of the subscribers (panics reported to the sink)
//!
//! No lock is held during steps 3 and 4, so sinks and subscribers may call
//! back into the service.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::classify::{ErrorContext, RawFailure, classify};
use crate::combinators::Outcome;
use crate::config::{ConfigError, ServiceConfig};
use crate::history::{DEFAULT_CAPACITY, ErrorFilter, ErrorStats, History};
use crate::record::{ErrorDetails, ErrorRecord, Metadata};
use crate::sink::{DIAGNOSTIC_TARGET, ErrorSink, NoopSink};
use crate::subscribers::{SubscriberRegistry, Subscription, panic_message};
use crate::taxonomy::ErrorType;

/// Centralized error classification, history and fan-out.
pub struct ErrorLogService {
    history: RwLock<History>,
    subscribers: SubscriberRegistry,
    sink: Arc<dyn ErrorSink>,
}

impl ErrorLogService {
    /// Service with the default capacity and the given sink.
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self::builder().sink(sink).build()
    }

    pub fn builder() -> ErrorLogServiceBuilder {
        ErrorLogServiceBuilder::default()
    }

    /// Composition root: capacity and sink from configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::builder()
            .capacity(config.history_capacity)
            .sink(config.build_sink())
            .build())
    }

    #[inline]
    fn read_history(&self) -> RwLockReadGuard<'_, History> {
        match self.history.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_history(&self) -> RwLockWriteGuard<'_, History> {
        match self.history.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a failure described by `details`.
    pub fn log_error(&self, details: ErrorDetails) -> Arc<ErrorRecord> {
        let record = Arc::new(ErrorRecord::from_details(details));

        // Guard dropped before the sink and subscribers run.
        let evicted = self.write_history().push(Arc::clone(&record));
        if let Some(old) = evicted {
            debug!(target: DIAGNOSTIC_TARGET, evicted = old.id().as_str(), "history full, evicted oldest record");
        }

        self.deliver_to_sink(&record);

        for failure in self.subscribers.notify(&record) {
            debug!(
                target: DIAGNOSTIC_TARGET,
                subscriber = %failure.subscriber,
                id = record.id().as_str(),
                "subscriber panicked"
            );
            let sink = &self.sink;
            let _ = catch_unwind(AssertUnwindSafe(|| sink.subscriber_failed(&record, &failure)));
        }

        record
    }

    fn deliver_to_sink(&self, record: &ErrorRecord) {
        match catch_unwind(AssertUnwindSafe(|| self.sink.deliver(record))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(
                target: DIAGNOSTIC_TARGET,
                sink = self.sink.name(),
                id = record.id().as_str(),
                error = %err,
                "sink delivery failed"
            ),
            Err(payload) => debug!(
                target: DIAGNOSTIC_TARGET,
                sink = self.sink.name(),
                id = record.id().as_str(),
                panic = %panic_message(payload.as_ref()),
                "sink panicked"
            ),
        }
    }

    /// Classify an arbitrary failure and record it.
    pub fn handle_error(&self, raw: impl Into<RawFailure>, context: &ErrorContext) -> Arc<ErrorRecord> {
        self.log_error(classify(raw.into(), context))
    }

    fn log_known(
        &self,
        error_type: ErrorType,
        message: impl Into<String>,
        user_message: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Arc<ErrorRecord> {
        let mut details = ErrorDetails::new(message, user_message)
            .with_type(error_type)
            .with_severity(error_type.default_severity());
        details.metadata = metadata;
        self.log_error(details)
    }

    /// `Network` / `High`.
    pub fn log_network_error(
        &self,
        message: impl Into<String>,
        user_message: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Arc<ErrorRecord> {
        self.log_known(ErrorType::Network, message, user_message, metadata)
    }

    /// `Validation` / `Low`.
    pub fn log_validation_error(
        &self,
        message: impl Into<String>,
        user_message: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Arc<ErrorRecord> {
        self.log_known(ErrorType::Validation, message, user_message, metadata)
    }

    /// `Authentication` / `High`.
    pub fn log_auth_error(
        &self,
        message: impl Into<String>,
        user_message: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Arc<ErrorRecord> {
        self.log_known(ErrorType::Authentication, message, user_message, metadata)
    }

    /// `BusinessLogic` / `Medium`.
    pub fn log_business_error(
        &self,
        message: impl Into<String>,
        user_message: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Arc<ErrorRecord> {
        self.log_known(ErrorType::BusinessLogic, message, user_message, metadata)
    }

    /// Register a callback for every future record.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Matching records, newest first. The vector is a fresh copy.
    pub fn get_errors(&self, filter: &ErrorFilter) -> Vec<Arc<ErrorRecord>> {
        self.read_history().query(filter)
    }

    /// Every retained record, newest first.
    pub fn all_errors(&self) -> Vec<Arc<ErrorRecord>> {
        self.get_errors(&ErrorFilter::default())
    }

    pub fn clear_errors(&self) {
        self.write_history().clear();
    }

    pub fn stats(&self) -> ErrorStats {
        self.read_history().stats()
    }

    /// History as a JSON array, newest first.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let records = self.all_errors();
        let borrowed: Vec<&ErrorRecord> = records.iter().map(Arc::as_ref).collect();
        serde_json::to_string_pretty(&borrowed)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.read_history().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.read_history().capacity()
    }

    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[inline]
    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Run `op` once, logging its failure under `context`.
    pub fn run<T, E, F>(&self, context: &ErrorContext, op: F) -> Outcome<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<RawFailure>,
    {
        match op() {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failed(self.handle_error(err, context)),
        }
    }

    /// Await `fut` once, logging its failure under `context`.
    pub async fn run_async<T, E, Fut>(&self, context: &ErrorContext, fut: Fut) -> Outcome<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawFailure>,
    {
        match fut.await {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failed(self.handle_error(err, context)),
        }
    }
}

impl std::fmt::Debug for ErrorLogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLogService")
            .field("history", &*self.read_history())
            .field("subscribers", &self.subscribers.len())
            .field("sink", &self.sink.name())
            .finish()
    }
}

/// Explicit construction with capacity and sink injection.
pub struct ErrorLogServiceBuilder {
    capacity: usize,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl Default for ErrorLogServiceBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sink: None,
        }
    }
}

impl ErrorLogServiceBuilder {
    /// History size (minimum 1).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the service; without a sink, records only reach history and subscribers.
    pub fn build(self) -> ErrorLogService {
        ErrorLogService {
            history: RwLock::new(History::new(self.capacity)),
            subscribers: SubscriberRegistry::new(),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::HttpFailure;
    use crate::sink::{SinkError, TelemetrySink};
    use crate::subscribers::SubscriberFailure;
    use crate::taxonomy::Severity;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sink that remembers what it saw.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
        subscriber_failures: Mutex<Vec<String>>,
    }

    impl ErrorSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn deliver(&self, record: &ErrorRecord) -> Result<(), SinkError> {
            self.delivered.lock().unwrap().push(record.id().to_string());
            Ok(())
        }

        fn subscriber_failed(&self, _record: &ErrorRecord, failure: &SubscriberFailure) {
            self.subscriber_failures.lock().unwrap().push(failure.message.clone());
        }
    }

    struct FailingSink;

    impl ErrorSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn deliver(&self, _record: &ErrorRecord) -> Result<(), SinkError> {
            Err(SinkError::Rejected {
                reason: "collector offline".into(),
            })
        }
    }

    struct PanickingSink;

    impl ErrorSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        fn deliver(&self, _record: &ErrorRecord) -> Result<(), SinkError> {
            panic!("sink bug")
        }
    }

    #[test]
    fn log_error_returns_stored_record() {
        let service = ErrorLogService::builder().build();
        let before = Utc::now();
        let record = service.log_error(ErrorDetails::new("m", "u"));

        assert!(!record.id().as_str().is_empty());
        assert!(record.timestamp() >= before);
        let stored = service.all_errors();
        assert_eq!(stored.len(), 1);
        assert!(Arc::ptr_eq(&stored[0], &record));
    }

    #[test]
    fn convenience_entry_points_fix_type_and_severity() {
        let service = ErrorLogService::builder().build();

        let cases = [
            (service.log_network_error("n", "u", None), ErrorType::Network, Severity::High),
            (service.log_validation_error("v", "u", None), ErrorType::Validation, Severity::Low),
            (service.log_auth_error("a", "u", None), ErrorType::Authentication, Severity::High),
            (service.log_business_error("b", "u", None), ErrorType::BusinessLogic, Severity::Medium),
        ];

        for (record, error_type, severity) in cases {
            assert_eq!(record.error_type(), error_type);
            assert_eq!(record.severity(), severity);
        }
    }

    #[test]
    fn convenience_entry_points_keep_metadata() {
        let service = ErrorLogService::builder().build();
        let mut meta = Metadata::new();
        meta.insert("field".into(), "email".into());

        let record = service.log_validation_error("bad email", "Check the email.", Some(meta));
        assert_eq!(record.metadata_value("field").and_then(|v| v.as_str()), Some("email"));
    }

    #[test]
    fn handle_error_classifies_and_attaches_context() {
        let service = ErrorLogService::builder().build();
        let record = service.handle_error(HttpFailure::response(403), &ErrorContext::at("BillingPage", "load"));

        assert_eq!(record.error_type(), ErrorType::Authentication);
        assert_eq!(record.component(), Some("BillingPage"));
        assert_eq!(record.action(), Some("load"));
    }

    #[test]
    fn sink_receives_each_record_once() {
        let sink = Arc::new(RecordingSink::default());
        let service = ErrorLogService::new(sink.clone());

        let a = service.log_error(ErrorDetails::new("a", "u"));
        let b = service.handle_error("b", &ErrorContext::new());

        let delivered = sink.delivered.lock().unwrap().clone();
        assert_eq!(delivered, vec![a.id().to_string(), b.id().to_string()]);
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let service = ErrorLogService::new(Arc::new(FailingSink));
        let record = service.log_error(ErrorDetails::new("a", "u"));
        assert_eq!(service.len(), 1);
        assert_eq!(record.message(), "a");
    }

    #[test]
    fn panicking_sink_is_swallowed() {
        let service = ErrorLogService::new(Arc::new(PanickingSink));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = service.on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        service.log_error(ErrorDetails::new("a", "u"));

        assert_eq!(service.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_panics_reach_sink_not_caller() {
        let sink = Arc::new(RecordingSink::default());
        let service = ErrorLogService::new(sink.clone());
        let _bad = service.on_error(|_| panic!("render failed"));

        let record = service.log_error(ErrorDetails::new("a", "u"));

        assert_eq!(record.message(), "a");
        assert_eq!(*sink.subscriber_failures.lock().unwrap(), vec!["render failed".to_string()]);
    }

    #[test]
    fn subscriber_may_log_reentrantly() {
        let service = Arc::new(ErrorLogService::builder().build());
        let inner = Arc::clone(&service);
        let _sub = service.on_error(move |record| {
            if record.error_type() != ErrorType::UserInput {
                inner.log_error(ErrorDetails::new("follow-up", "u").with_type(ErrorType::UserInput));
            }
        });

        service.log_error(ErrorDetails::new("first", "u"));

        let messages: Vec<String> = service.all_errors().iter().map(|r| r.message().to_string()).collect();
        assert_eq!(messages, ["follow-up", "first"]);
    }

    #[test]
    fn subscriber_sees_exact_record() {
        let service = ErrorLogService::builder().build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = service.on_error(move |r| sink.lock().unwrap().push(r.id().clone()));

        let record = service.log_error(ErrorDetails::new("a", "u"));
        sub.unsubscribe();
        service.log_error(ErrorDetails::new("b", "u"));

        assert_eq!(*seen.lock().unwrap(), vec![record.id().clone()]);
        assert_eq!(service.subscriber_count(), 0);
    }

    #[test]
    fn clear_and_stats() {
        let service = ErrorLogService::builder().capacity(2).build();
        for i in 0..3 {
            service.log_network_error(format!("n{i}"), "u", None);
        }

        let stats = service.stats();
        assert_eq!(stats.total_logged, 3);
        assert_eq!(stats.retained, 2);
        assert_eq!(stats.evicted, 1);

        service.clear_errors();
        assert!(service.is_empty());
        assert!(service.all_errors().is_empty());
    }

    #[test]
    fn export_is_newest_first_json() {
        let service = ErrorLogService::builder().build();
        service.log_error(ErrorDetails::new("old", "u"));
        service.log_error(ErrorDetails::new("new", "u"));

        let json: serde_json::Value = serde_json::from_str(&service.export_json().unwrap()).unwrap();
        let array = json.as_array().unwrap();
        assert_eq!(array[0]["message"], "new");
        assert_eq!(array[1]["message"], "old");
    }

    #[test]
    fn from_config_selects_sink_and_capacity() {
        let mut config = ServiceConfig::default();
        config.history_capacity = 7;
        config.mode = crate::config::RunMode::Production;

        let service = ErrorLogService::from_config(&config).unwrap();
        assert_eq!(service.capacity(), 7);
        assert_eq!(service.sink_name(), "telemetry");

        config.history_capacity = 0;
        assert!(ErrorLogService::from_config(&config).is_err());
    }

    #[test]
    fn telemetry_overflow_does_not_affect_history() {
        let service = ErrorLogService::new(Arc::new(TelemetrySink::new("stub", 1)));
        service.log_error(ErrorDetails::new("a", "u"));
        service.log_error(ErrorDetails::new("b", "u"));
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn run_helpers_wrap_results() {
        let service = ErrorLogService::builder().build();
        let ctx = ErrorContext::at("JobForm", "submit");

        let ok: Outcome<u32> = service.run(&ctx, || Ok::<_, String>(5));
        assert_eq!(ok.ok(), Some(5));
        assert!(service.is_empty());

        let failed: Outcome<u32> = service.run(&ctx, || Err("boom"));
        assert!(failed.is_failed());
        assert_eq!(service.len(), 1);
    }
}
