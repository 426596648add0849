// src/history.rs
//! Bounded record history with FIFO eviction.
//!
//! Keeps a fixed-size circular buffer of the most recent records so a
//! misbehaving page that fails in a loop cannot grow memory without bound.
//!
//! # Design Principles
//!
//! - **Bounded memory**: fixed slot count, allocated once
//! - **FIFO eviction**: the oldest record is dropped, never the newest
//! - **O(1) append and evict**: index arithmetic, no reallocation or shifting
//! - **Cheap reads**: slots hold `Arc<ErrorRecord>`, so snapshots clone pointers
//!
//! # Example
//!
//! ```rust
//! use fsm_error_log::history::ErrorFilter;
//! use fsm_error_log::{ErrorLogService, ErrorType};
//!
//! let service = ErrorLogService::builder().capacity(2).build();
//! service.log_validation_error("zip", "Check the postal code.", None);
//! service.log_network_error("timeout", "Connection problem.", None);
//! service.log_validation_error("phone", "Check the phone number.", None);
//!
//! let validation = service.get_errors(&ErrorFilter::new().with_type(ErrorType::Validation));
//! assert_eq!(validation.len(), 1);
//! assert_eq!(validation[0].message(), "phone");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::record::ErrorRecord;
use crate::taxonomy::{ErrorType, Severity};

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// Query over the history. All criteria are optional and combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorFilter {
    pub error_type: Option<ErrorType>,
    pub severity: Option<Severity>,
    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

impl ErrorFilter {
    pub fn new() -> Self {
        Self::default()
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
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes the type and severity criteria.
    pub fn matches(&self, record: &ErrorRecord) -> bool {
        self.error_type.is_none_or(|t| record.error_type() == t)
            && self.severity.is_none_or(|s| record.severity() == s)
    }
}

/// Counts over the current history plus lifetime totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    /// Records created since construction, including evicted and cleared ones
    pub total_logged: u64,
    /// Records currently held
    pub retained: usize,
    /// Records dropped by the capacity limit
    pub evicted: u64,
    pub by_type: BTreeMap<ErrorType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

/// Fixed-size circular buffer of records.
pub struct History {
    slots: Box<[Option<Arc<ErrorRecord>>]>,
    /// Next write position
    tail: usize,
    /// Oldest record position
    head: usize,
    len: usize,
    total_logged: u64,
    evicted: u64,
}

impl History {
    /// Create a history holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: std::iter::repeat_with(|| None)
                .take(capacity)
                .collect::<Box<[Option<Arc<ErrorRecord>>]>>(),
            tail: 0,
            head: 0,
            len: 0,
            total_logged: 0,
            evicted: 0,
        }
    }

    /// Append a record, returning the evicted one when the buffer was full.
    pub fn push(&mut self, record: Arc<ErrorRecord>) -> Option<Arc<ErrorRecord>> {
        let cap = self.slots.len();
        let evicted = self.slots[self.tail].replace(record);
        self.tail = (self.tail + 1) % cap;

        if self.len < cap {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % cap;
            self.evicted += 1;
        }
        self.total_logged += 1;

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Records oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<ErrorRecord>> {
        let head = self.head;
        let cap = self.slots.len();

        (0..self.len).filter_map(move |i| self.slots[(head + i) % cap].as_ref())
    }

    /// Matching records, newest first, at most `filter.limit` of them.
    pub fn query(&self, filter: &ErrorFilter) -> Vec<Arc<ErrorRecord>> {
        self.iter()
            .rev()
            .filter(|r| filter.matches(r))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Drop every record. Lifetime counters are kept.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    pub fn stats(&self) -> ErrorStats {
        let mut stats = ErrorStats {
            total_logged: self.total_logged,
            retained: self.len,
            evicted: self.evicted,
            ..ErrorStats::default()
        };
        for record in self.iter() {
            *stats.by_type.entry(record.error_type()).or_default() += 1;
            *stats.by_severity.entry(record.severity()).or_default() += 1;
        }
        stats
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("len", &self.len)
            .field("capacity", &self.slots.len())
            .field("evicted", &self.evicted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ErrorDetails;

    fn record(message: &str, error_type: ErrorType) -> Arc<ErrorRecord> {
        Arc::new(ErrorRecord::from_details(
            ErrorDetails::new(message, "user").with_type(error_type),
        ))
    }

    #[test]
    fn evicts_oldest() {
        let mut history = History::new(3);

        for i in 0..5 {
            history.push(record(&format!("error {i}"), ErrorType::System));
        }

        assert_eq!(history.len(), 3);
        let all = history.query(&ErrorFilter::new());
        assert_eq!(all[0].message(), "error 4");
        assert_eq!(all[2].message(), "error 2");

        let stats = history.stats();
        assert_eq!(stats.evicted, 2);
        assert_eq!(stats.total_logged, 5);
    }

    #[test]
    fn push_returns_evicted_record() {
        let mut history = History::new(1);
        let first = record("first", ErrorType::System);
        assert!(history.push(Arc::clone(&first)).is_none());

        let evicted = history.push(record("second", ErrorType::System)).unwrap();
        assert!(Arc::ptr_eq(&evicted, &first));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = History::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(record("a", ErrorType::System));
        history.push(record("b", ErrorType::System));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn query_filters_then_limits_newest() {
        let mut history = History::new(10);
        for i in 0..6 {
            let t = if i % 2 == 0 { ErrorType::Validation } else { ErrorType::Network };
            history.push(record(&format!("e{i}"), t));
        }

        let validation = history.query(&ErrorFilter::new().with_type(ErrorType::Validation));
        let messages: Vec<&str> = validation.iter().map(|r| r.message()).collect();
        assert_eq!(messages, ["e4", "e2", "e0"]);

        let limited = history.query(&ErrorFilter::new().with_type(ErrorType::Validation).with_limit(2));
        let messages: Vec<&str> = limited.iter().map(|r| r.message()).collect();
        assert_eq!(messages, ["e4", "e2"]);
    }

    #[test]
    fn query_by_severity() {
        let mut history = History::new(10);
        history.push(Arc::new(ErrorRecord::from_details(
            ErrorDetails::new("low", "u").with_severity(Severity::Low),
        )));
        history.push(Arc::new(ErrorRecord::from_details(
            ErrorDetails::new("high", "u").with_severity(Severity::High),
        )));

        let high = history.query(&ErrorFilter::new().with_severity(Severity::High));
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].message(), "high");
    }

    #[test]
    fn limit_zero_returns_nothing() {
        let mut history = History::new(4);
        history.push(record("a", ErrorType::System));
        assert!(history.query(&ErrorFilter::new().with_limit(0)).is_empty());
    }

    #[test]
    fn clear_empties_but_keeps_totals() {
        let mut history = History::new(4);
        for i in 0..3 {
            history.push(record(&format!("{i}"), ErrorType::System));
        }
        history.clear();

        assert!(history.is_empty());
        assert!(history.query(&ErrorFilter::new()).is_empty());
        assert_eq!(history.stats().total_logged, 3);

        history.push(record("after", ErrorType::System));
        assert_eq!(history.query(&ErrorFilter::new())[0].message(), "after");
    }

    #[test]
    fn wraparound_keeps_order() {
        let mut history = History::new(4);
        for i in 0..11 {
            history.push(record(&format!("{i}"), ErrorType::System));
        }
        let oldest_first: Vec<&str> = history.iter().map(|r| r.message()).collect();
        assert_eq!(oldest_first, ["7", "8", "9", "10"]);
    }

    #[test]
    fn stats_count_retained_records() {
        let mut history = History::new(10);
        history.push(record("a", ErrorType::Network));
        history.push(record("b", ErrorType::Network));
        history.push(record("c", ErrorType::Authentication));

        let stats = history.stats();
        assert_eq!(stats.retained, 3);
        assert_eq!(stats.by_type.get(&ErrorType::Network), Some(&2));
        assert_eq!(stats.by_type.get(&ErrorType::Authentication), Some(&1));
        assert_eq!(stats.by_severity.get(&Severity::Medium), Some(&3));
    }
}
