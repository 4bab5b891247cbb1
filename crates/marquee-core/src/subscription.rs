//! Disposers for listeners and timers
//!
//! Every listener registration and every spawned timer hands back a
//! [`Subscription`]. Owners collect them in a [`TeardownList`] and release
//! them in reverse registration order.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

type Disposer = Box<dyn FnOnce() + Send>;

/// Lock a mutex, recovering the data if a listener panicked while holding it
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One-shot release of a single registration
pub struct Subscription {
    disposer: Mutex<Option<Disposer>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Mutex::new(Some(Box::new(disposer))),
        }
    }

    /// A subscription with nothing to release
    pub fn empty() -> Self {
        Self {
            disposer: Mutex::new(None),
        }
    }

    /// Subscription that aborts a spawned task
    pub fn from_task<T: Send + 'static>(handle: tokio::task::JoinHandle<T>) -> Self {
        let abort = handle.abort_handle();
        Self::new(move || abort.abort())
    }

    /// Release the registration; later calls do nothing
    pub fn dispose(&self) {
        let disposer = lock_unpoisoned(&self.disposer).take();
        if let Some(disposer) = disposer {
            disposer();
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock_unpoisoned(&self.disposer).is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Ordered set of subscriptions released together
#[derive(Debug, Default)]
pub struct TeardownList {
    entries: Vec<Subscription>,
}

impl TeardownList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.entries.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything, newest first
    pub fn run(&mut self) {
        while let Some(entry) = self.entries.pop() {
            entry.dispose();
        }
    }

    /// Move the entries out so they can be released without holding a lock
    pub fn take(&mut self) -> TeardownList {
        TeardownList {
            entries: std::mem::take(&mut self.entries),
        }
    }
}

impl Drop for TeardownList {
    fn drop(&mut self) {
        self.run();
    }
}

/// Registry of listeners for implementors of the event seams
///
/// `add` hands back a [`Subscription`] that removes the listener again.
/// Dispatch takes a snapshot first so listeners may subscribe, unsubscribe
/// or call back into their emitter.
pub struct ListenerSet<L> {
    inner: Arc<Mutex<ListenerEntries<L>>>,
}

struct ListenerEntries<L> {
    next_id: u64,
    entries: Vec<(u64, L)>,
}

impl<L: Clone + Send + 'static> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerEntries {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn add(&self, listener: L) -> Subscription {
        let id = {
            let mut inner = lock_unpoisoned(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, listener));
            id
        };

        let registry = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock_unpoisoned(&registry).entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub fn snapshot(&self) -> Vec<L> {
        lock_unpoisoned(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock_unpoisoned(&self.inner).entries.clear();
    }
}

impl<L: Clone + Send + 'static> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}
