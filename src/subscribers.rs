//! Subscriber registry: synchronous fan-out of new records.
//!
//! Delivery works on a snapshot of the registry taken when the round starts,
//! so a callback may register, unregister or log another error without
//! disturbing the round in progress. Subscribers added during a round first
//! hear about the next record.
//!
//! Each callback runs behind its own unwind boundary. A panicking subscriber
//! is reported back to the caller of [`SubscriberRegistry::notify`] as a
//! [`SubscriberFailure`] and the remaining subscribers still run.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use smallvec::SmallVec;

use crate::record::ErrorRecord;

/// Callback invoked for every new record.
pub type Callback = dyn Fn(&ErrorRecord) + Send + Sync;

/// Registration handle identifier, unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// A subscriber that panicked while handling a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    pub subscriber: SubscriberId,
    /// Panic payload rendered as text
    pub message: String,
}

/// Snapshot of the callbacks taking part in one delivery round.
type Snapshot = SmallVec<[(SubscriberId, Arc<Callback>); 4]>;

struct RegistryInner {
    entries: RwLock<Vec<(SubscriberId, Arc<Callback>)>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    #[inline]
    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<(SubscriberId, Arc<Callback>)>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<(SubscriberId, Arc<Callback>)>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.write_entries();
        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Ordered set of callbacks.
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback`; it is delivered after every earlier subscriber.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.write_entries().push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Unregister by id. Returns `false` if it was not registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.inner.remove(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.read_entries().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Snapshot {
        self.inner
            .read_entries()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect()
    }

    /// Deliver `record` to every subscriber registered right now.
    ///
    /// No lock is held while callbacks run.
    pub fn notify(&self, record: &ErrorRecord) -> SmallVec<[SubscriberFailure; 1]> {
        let mut failures = SmallVec::new();

        for (id, callback) in self.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(record))) {
                failures.push(SubscriberFailure {
                    subscriber: id,
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        failures
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Handle returned by registration.
///
/// Dropping the handle does not unregister; call
/// [`unsubscribe`](Self::unsubscribe), which is safe to call repeatedly.
#[must_use = "keep the subscription to be able to unsubscribe"]
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop receiving records. Returns `true` only on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => inner.remove(self.id),
            None => false,
        }
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|inner| inner.read_entries().iter().any(|(id, _)| *id == self.id))
    }
}

/// Render a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
