//! Wrapping fallible operations so their failures land in the service.
//!
//! A wrapped operation never returns an error to its caller. On success it
//! yields [`Outcome::Success`]; on failure the error is classified, logged
//! under the wrapper's [`ErrorContext`], and the caller receives
//! [`Outcome::Failed`] carrying the stored record. Callers that only want the
//! "value or nothing" view use [`Outcome::ok`].
//!
//! ```rust
//! use std::sync::Arc;
//! use fsm_error_log::{ErrorContext, ErrorLogService, with_sync_error_handling};
//!
//! let service = Arc::new(ErrorLogService::builder().build());
//! let parse = with_sync_error_handling(
//!     Arc::clone(&service),
//!     ErrorContext::at("QuoteEditor", "parse_amount"),
//!     |raw: &str| raw.parse::<u32>().map_err(|e| e.to_string()),
//! );
//!
//! assert_eq!(parse.call("42").ok(), Some(42));
//! assert!(parse.call("forty-two").is_failed());
//! assert_eq!(service.len(), 1);
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures_util::FutureExt;

use crate::classify::{ErrorContext, RawFailure};
use crate::record::ErrorRecord;
use crate::service::ErrorLogService;
use crate::subscribers::panic_message;

/// Result of a guarded operation.
#[must_use]
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    /// The failure was logged; this is the stored record.
    Failed(Arc<ErrorRecord>),
}

impl<T> Outcome<T> {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The value, or `None` if the operation failed.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn record(&self) -> Option<&Arc<ErrorRecord>> {
        match self {
            Self::Success(_) => None,
            Self::Failed(record) => Some(record),
        }
    }

    pub fn into_result(self) -> Result<T, Arc<ErrorRecord>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failed(record) => Err(record),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failed(record) => Outcome::Failed(record),
        }
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.ok()
    }
}

/// Synchronous operation bound to a service and a context.
///
/// Panics inside the operation are caught and logged as failures.
pub struct GuardedFn<F> {
    service: Arc<ErrorLogService>,
    context: ErrorContext,
    op: F,
}

impl<F> GuardedFn<F> {
    pub fn call<A, T, E>(&self, arg: A) -> Outcome<T>
    where
        F: Fn(A) -> Result<T, E>,
        E: Into<RawFailure>,
    {
        match catch_unwind(AssertUnwindSafe(|| (self.op)(arg))) {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(err)) => Outcome::Failed(self.service.handle_error(err, &self.context)),
            Err(payload) => Outcome::Failed(log_panic(&self.service, &self.context, payload)),
        }
    }

    #[inline]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

/// Record a caught panic as an exception named `panic`.
fn log_panic(service: &ErrorLogService, context: &ErrorContext, payload: Box<dyn Any + Send>) -> Arc<ErrorRecord> {
    let raw = RawFailure::exception("panic", panic_message(payload.as_ref()));
    service.handle_error(raw, context)
}

/// Asynchronous operation bound to a service and a context.
///
/// Panics while building or polling the future are caught and logged.
pub struct GuardedAsyncFn<F> {
    service: Arc<ErrorLogService>,
    context: ErrorContext,
    op: F,
}

impl<F> GuardedAsyncFn<F> {
    pub async fn call<A, T, E, Fut>(&self, arg: A) -> Outcome<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawFailure>,
    {
        let fut = match catch_unwind(AssertUnwindSafe(|| (self.op)(arg))) {
            Ok(fut) => fut,
            Err(payload) => return Outcome::Failed(log_panic(&self.service, &self.context, payload)),
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Outcome::Success(value),
            Ok(Err(err)) => Outcome::Failed(self.service.handle_error(err, &self.context)),
            Err(payload) => Outcome::Failed(log_panic(&self.service, &self.context, payload)),
        }
    }

    #[inline]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

/// Wrap an async operation so its failures are logged under `context`.
pub fn with_error_handling<F>(service: Arc<ErrorLogService>, context: ErrorContext, op: F) -> GuardedAsyncFn<F> {
    GuardedAsyncFn { service, context, op }
}

/// Wrap a synchronous operation so its failures are logged under `context`.
pub fn with_sync_error_handling<F>(service: Arc<ErrorLogService>, context: ErrorContext, op: F) -> GuardedFn<F> {
    GuardedFn { service, context, op }
}

/// Log a `Result`'s error in place.
///
/// ```rust
/// use fsm_error_log::{ErrorContext, ErrorLogService, ResultExt};
///
/// let service = ErrorLogService::builder().build();
/// let ctx = ErrorContext::at("Settings", "read_file");
/// let outcome = std::fs::read_to_string("/definitely/missing").or_log(&service, &ctx);
/// assert!(outcome.is_failed());
/// ```
pub trait ResultExt<T> {
    fn or_log(self, service: &ErrorLogService, context: &ErrorContext) -> Outcome<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<RawFailure>,
{
    fn or_log(self, service: &ErrorLogService, context: &ErrorContext) -> Outcome<T> {
        match self {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failed(service.handle_error(err, context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::HttpFailure;
    use crate::taxonomy::{ErrorType, Severity};

    fn service() -> Arc<ErrorLogService> {
        Arc::new(ErrorLogService::builder().build())
    }

    #[test]
    fn sync_success_passes_value_through() {
        let service = service();
        let double = with_sync_error_handling(Arc::clone(&service), ErrorContext::new(), |n: u32| {
            Ok::<_, String>(n * 2)
        });

        assert_eq!(double.call(21).ok(), Some(42));
        assert!(service.is_empty());
    }

    #[test]
    fn sync_failure_is_logged_with_context() {
        let service = service();
        let op = with_sync_error_handling(
            Arc::clone(&service),
            ErrorContext::at("JobList", "refresh"),
            |_: ()| Err::<(), _>(HttpFailure::response(404)),
        );

        let outcome = op.call(());
        let record = outcome.record().cloned().unwrap();
        assert_eq!(record.error_type(), ErrorType::Network);
        assert_eq!(record.component(), Some("JobList"));
        assert_eq!(record.action(), Some("refresh"));
        assert!(Arc::ptr_eq(&service.all_errors()[0], &record));
    }

    #[test]
    fn sync_panic_becomes_system_failure() {
        let service = service();
        let op = with_sync_error_handling(Arc::clone(&service), ErrorContext::at("Calc", "divide"), |d: u32| {
            if d == 0 {
                panic!("division by zero");
            }
            Ok::<_, String>(10 / d)
        });

        let record = op.call(0).into_result().unwrap_err();
        assert_eq!(record.error_type(), ErrorType::System);
        assert_eq!(record.severity(), Severity::Medium);
        assert!(record.message().contains("division by zero"));
        assert_eq!(op.call(5).ok(), Some(2));
    }

    #[test]
    fn outcome_helpers() {
        let service = service();
        let failed: Outcome<u8> = Err::<u8, _>("x").or_log(&service, &ErrorContext::new());
        assert!(failed.is_failed());
        assert_eq!(Option::<u8>::from(failed.clone()), None);
        assert!(failed.map(|n| n + 1).is_failed());

        let ok: Outcome<u8> = Ok::<u8, String>(1).or_log(&service, &ErrorContext::new());
        assert!(ok.is_success());
        assert!(ok.record().is_none());
        assert_eq!(ok.map(|n| n + 1).ok(), Some(2));
    }

    #[tokio::test]
    async fn async_wrapper_logs_rejections() {
        let service = service();
        let fetch = with_error_handling(
            Arc::clone(&service),
            ErrorContext::at("Dashboard", "fetch").with_user_message("Could not load the dashboard."),
            |id: u32| async move {
                if id == 0 {
                    Err(HttpFailure::response(500))
                } else {
                    Ok(id)
                }
            },
        );

        assert_eq!(fetch.call(7).await.ok(), Some(7));
        let record = fetch.call(0).await.into_result().unwrap_err();
        assert_eq!(record.user_message(), "Could not load the dashboard.");
        assert_eq!(record.severity(), Severity::High);
        assert_eq!(service.len(), 1);
    }

    #[tokio::test]
    async fn async_panic_becomes_system_failure() {
        let service = service();
        let op = with_error_handling(
            Arc::clone(&service),
            ErrorContext::at("Sync", "upload"),
            |n: u32| async move {
                tokio::task::yield_now().await;
                if n == 0 {
                    panic!("upload queue corrupted");
                }
                Ok::<_, String>(n)
            },
        );

        let record = op.call(0).await.into_result().unwrap_err();
        assert_eq!(record.error_type(), ErrorType::System);
        assert_eq!(record.action(), Some("upload"));
        assert!(record.message().contains("upload queue corrupted"));
        assert_eq!(record.metadata_value("name").and_then(|v| v.as_str()), Some("panic"));
        assert_eq!(service.len(), 1);

        assert_eq!(op.call(4).await.ok(), Some(4));
    }

    #[tokio::test]
    async fn async_panic_while_building_future_is_caught() {
        let service = service();
        let op = with_error_handling(Arc::clone(&service), ErrorContext::new(), |n: u32| {
            assert!(n > 0, "zero is not a valid job id");
            async move { Ok::<_, String>(n) }
        });

        assert!(op.call(0).await.is_failed());
        assert_eq!(service.len(), 1);
    }
}
