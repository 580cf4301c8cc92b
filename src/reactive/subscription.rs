use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    key: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

struct ListenerList<T> {
    next_key: u64,
    entries: Vec<Entry<T>>,
}

/// Ordered listener registry owned by a node.
pub(crate) struct Listeners<T> {
    list: Arc<Mutex<ListenerList<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            list: Arc::new(Mutex::new(ListenerList {
                next_key: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let key = {
            let mut list = self.list.lock();
            let key = list.next_key;
            list.next_key += 1;
            list.entries.push(Entry {
                key,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
            key
        };

        let list: Weak<Mutex<ListenerList<T>>> = Arc::downgrade(&self.list);
        Subscription::new(active, move || {
            if let Some(list) = list.upgrade() {
                list.lock().entries.retain(|entry| entry.key != key);
            }
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.list.lock().entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.list.lock().entries.len()
    }

    /// Call every listener in subscription order.
    ///
    /// The registry lock is released before any callback runs, so a listener
    /// may subscribe or unsubscribe. A listener unsubscribed mid-round is
    /// skipped.
    pub(crate) fn emit(&self, value: &T) {
        let snapshot: Vec<(Arc<AtomicBool>, Callback<T>)> = self
            .list
            .lock()
            .entries
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.callback)))
            .collect();

        for (active, callback) in snapshot {
            if active.load(Ordering::Acquire) {
                callback(value);
            }
        }
    }
}

/// Handle for a registered listener.
///
/// Dropping the handle unsubscribes. [`Subscription::unsubscribe`] may be
/// called any number of times.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    active: Arc<AtomicBool>,
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(active: Arc<AtomicBool>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            active,
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_in_subscription_order() {
        let listeners = Listeners::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = Arc::clone(&log);
            listeners.add(move |v| log.lock().push(("first", *v)))
        };
        let second = {
            let log = Arc::clone(&log);
            listeners.add(move |v| log.lock().push(("second", *v)))
        };

        listeners.emit(&7);
        assert_eq!(*log.lock(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let listeners = Listeners::<u32>::new();
        let sub = listeners.add(|_| {});
        assert_eq!(listeners.len(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let listeners = Listeners::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            let _sub = listeners.add(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
            listeners.emit(&1);
        }
        listeners.emit(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let listeners = Listeners::<u32>::new();
        let sub = listeners.add(|_| {});
        drop(listeners);
        sub.unsubscribe();
    }
}
