//! Dynamic<T> - A latest-value cell with change notifications
//!
//! `Dynamic<T>` holds one value and a version counter. Writers replace the
//! value; readers hold a [`Subscription`] that remembers the last version it
//! saw. A subscription that falls behind skips straight to the newest value,
//! which is what coalescing rapid snapshot emissions needs.
//!
//! Polling is synchronous. `Subscription::changed` additionally lets an
//! async owner sleep until the next write.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct DynamicInner<T> {
    value: RwLock<T>,
    /// Incremented on each update.
    version: AtomicU64,
    notify: Notify,
    closed: AtomicBool,
}

/// A reactive value that can be observed for changes.
///
/// `Dynamic<T>` is `Send + Sync` and cheap to clone; clones share the value.
///
/// # Example
///
/// ```rust
/// use listfeed_core::reactive::Dynamic;
///
/// let counter = Dynamic::new(0);
/// let mut sub = counter.subscribe();
///
/// counter.set(1);
/// counter.set(2);
/// assert_eq!(sub.poll(), Some(2));
/// assert_eq!(sub.poll(), None);
/// ```
#[derive(Clone)]
pub struct Dynamic<T> {
    inner: Arc<DynamicInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Dynamic<T> {
    /// Create a new Dynamic with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Get the current version number.
    ///
    /// The version is incremented each time `set()` is called.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Set a new value, bump the version and wake waiting subscribers.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.write();
            *guard = value;
            // Bump under the lock so a reader never pairs a new version with an old value.
            self.inner.version.fetch_add(1, Ordering::AcqRel);
        }
        self.inner.notify.notify_waiters();
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Mark the cell closed; waiting subscribers wake and see `None`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribe to value changes from the current version onward.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            source: self.inner.clone(),
            last_version: self.inner.version.load(Ordering::Acquire),
            skipped: 0,
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Dynamic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynamic")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}

/// A subscription to a Dynamic value.
///
/// Tracks the version it last observed. Intermediate versions written
/// between two polls are never seen; [`Subscription::skipped`] counts them.
pub struct Subscription<T> {
    source: Arc<DynamicInner<T>>,
    last_version: u64,
    skipped: u64,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    /// Check if the source has changed since the last poll.
    pub fn has_changed(&self) -> bool {
        self.source.version.load(Ordering::Acquire) > self.last_version
    }

    /// Poll for a new value.
    ///
    /// Returns `Some(value)` if the source has been updated since the last
    /// poll, `None` otherwise.
    pub fn poll(&mut self) -> Option<T> {
        let guard = self.source.value.read();
        let current_version = self.source.version.load(Ordering::Acquire);
        if current_version > self.last_version {
            self.skipped += current_version - self.last_version - 1;
            self.last_version = current_version;
            Some(guard.clone())
        } else {
            None
        }
    }

    /// Wait until the source changes, then return the newest value.
    ///
    /// Returns `None` once the source is closed and nothing newer is pending.
    pub async fn changed(&mut self) -> Option<T> {
        let source = Arc::clone(&self.source);
        loop {
            let notified = source.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a write between check and await is not lost.
            notified.as_mut().enable();
            if let Some(value) = self.poll() {
                return Some(value);
            }
            if source.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Get the current value regardless of change.
    pub fn get(&self) -> T {
        self.source.value.read().clone()
    }

    /// Version last returned by `poll`.
    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    /// Number of versions coalesced away so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
