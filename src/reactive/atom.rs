use parking_lot::Mutex;
use std::sync::Arc;

use super::runtime::{Node, NodeCore, NodeHandle, NodeId, Runtime};
use super::subscription::{Listeners, Subscription};

/// Mutable, observable root cell.
///
/// `set` only commits (and notifies) when the new value differs from the
/// current one under the atom's equality. Values are handed out by clone, so
/// large payloads are best stored behind an `Arc`.
pub struct Atom<T> {
    inner: Arc<AtomInner<T>>,
}

struct AtomInner<T> {
    core: NodeCore,
    runtime: Runtime,
    slot: Mutex<Slot<T>>,
    eq: fn(&T, &T) -> bool,
    listeners: Listeners<T>,
}

struct Slot<T> {
    value: T,
    version: u64,
    /// Version last delivered to listeners.
    notified: u64,
    /// Value as of `notified`, kept while a change is pending delivery.
    baseline: Option<T>,
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Atom<T> {
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::with_equality(runtime, value, T::eq)
    }
}

impl<T: Clone + Send + Sync + 'static> Atom<T> {
    /// Create an atom that compares values with `eq` instead of `PartialEq`.
    pub fn with_equality(runtime: &Runtime, value: T, eq: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                core: NodeCore::new(runtime.next_id(), 0),
                runtime: runtime.clone(),
                slot: Mutex::new(Slot {
                    value,
                    version: 0,
                    notified: 0,
                    baseline: None,
                }),
                eq,
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        let _critical = self.inner.runtime.enter();
        self.inner.slot.lock().value.clone()
    }

    /// Replace the value. Equal values are ignored.
    ///
    /// Outside a batch, subscribers (of this atom and of every computed node
    /// whose output changed as a result) are notified before `set` returns.
    pub fn set(&self, value: T) {
        let _critical = self.inner.runtime.enter();
        {
            let mut slot = self.inner.slot.lock();
            if (self.inner.eq)(&slot.value, &value) {
                return;
            }
            let previous = std::mem::replace(&mut slot.value, value);
            if slot.notified == slot.version {
                slot.baseline = Some(previous);
            }
            slot.version += 1;
        }
        tracing::trace!(node = ?self.inner.core.id, "Atom committed");
        self.inner.runtime.commit(self.inner.clone());
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _critical = self.inner.runtime.enter();
        let current = self.inner.slot.lock().value.clone();
        self.set(f(&current));
    }

    /// Register a listener called after every committed change.
    ///
    /// The listener is not called with the current value, nor with a change
    /// committed before it subscribed.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let _critical = self.inner.runtime.enter();
        if self.inner.listeners.is_empty() {
            let mut slot = self.inner.slot.lock();
            slot.notified = slot.version;
            slot.baseline = None;
        }
        self.inner.listeners.add(listener)
    }

    /// Number of committed changes since construction.
    pub fn version(&self) -> u64 {
        self.inner.slot.lock().version
    }

    pub fn id(&self) -> NodeId {
        self.inner.core.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub(crate) fn handle(&self) -> NodeHandle {
        NodeHandle::new(self.inner.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> Node for AtomInner<T> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn version(&self) -> u64 {
        self.slot.lock().version
    }

    fn notify(&self) {
        let value = {
            let mut slot = self.slot.lock();
            if slot.notified == slot.version {
                return;
            }
            slot.notified = slot.version;
            // A batch that ends on the value last delivered is not a change.
            if let Some(baseline) = slot.baseline.take() {
                if (self.eq)(&baseline, &slot.value) {
                    return;
                }
            }
            slot.value.clone()
        };
        self.listeners.emit(&value);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Atom<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("Atom")
            .field("id", &self.inner.core.id)
            .field("version", &slot.version)
            .field("value", &slot.value)
            .finish()
    }
}
