use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::atom::Atom;
use super::runtime::{Node, NodeCore, NodeHandle, NodeId, Runtime};
use super::subscription::{Listeners, Subscription};

// ============================================================================
// Sources
// ============================================================================

/// A cell that can feed a [`Computed`] node.
///
/// Implemented for [`Atom`] and [`Computed`].
pub trait Source: Clone + Send + Sync + 'static {
    type Output;

    fn get(&self) -> Self::Output;

    #[doc(hidden)]
    fn handle(&self) -> NodeHandle;
}

impl<T: Clone + Send + Sync + 'static> Source for Atom<T> {
    type Output = T;

    fn get(&self) -> T {
        Atom::get(self)
    }

    fn handle(&self) -> NodeHandle {
        Atom::handle(self)
    }
}

impl<T: Clone + Send + Sync + 'static> Source for Computed<T> {
    type Output = T;

    fn get(&self) -> T {
        Computed::get(self)
    }

    fn handle(&self) -> NodeHandle {
        NodeHandle::new(self.inner.clone())
    }
}

/// Ordered upstream list of a [`Computed`] node, written as a tuple of cells.
///
/// The combining function receives the tuple of their current values.
pub trait Sources: Send + Sync + 'static {
    type Values;

    fn values(&self) -> Self::Values;

    fn handles(&self) -> Vec<NodeHandle>;
}

macro_rules! tuple_sources {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Source),+> Sources for ($($name,)+) {
            type Values = ($(<$name as Source>::Output,)+);

            fn values(&self) -> Self::Values {
                ($(self.$idx.get(),)+)
            }

            fn handles(&self) -> Vec<NodeHandle> {
                vec![$(self.$idx.handle()),+]
            }
        }
    };
}

tuple_sources!(A: 0);
tuple_sources!(A: 0, B: 1);
tuple_sources!(A: 0, B: 1, C: 2);
tuple_sources!(A: 0, B: 1, C: 2, D: 3);
tuple_sources!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_sources!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

// ============================================================================
// Computed
// ============================================================================

/// Memoized cell derived from an explicit list of upstream cells.
///
/// The value is computed once at construction. Afterwards `get` compares the
/// upstream versions recorded at the last computation with the current ones
/// and only re-runs the combining function when one of them moved. A result
/// equal to the memo keeps the old value and version, so nothing downstream
/// recomputes and no subscriber is called.
///
/// Nodes without subscribers are lazy: a commit upstream only marks them as
/// reachable, and the work happens on the next `get`.
pub struct Computed<T> {
    inner: Arc<ComputedInner<T>>,
}

type Compute<T> = Box<dyn Fn() -> T + Send + Sync>;

struct ComputedInner<T> {
    core: NodeCore,
    runtime: Runtime,
    upstream: Vec<NodeHandle>,
    compute: Compute<T>,
    eq: fn(&T, &T) -> bool,
    memo: Mutex<Memo<T>>,
    recomputations: AtomicU64,
    listeners: Listeners<T>,
}

struct Memo<T> {
    value: T,
    /// Upstream versions the value was computed from.
    seen: Vec<u64>,
    version: u64,
    notified: u64,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Computed<T> {
    pub fn new<S, F>(runtime: &Runtime, sources: S, f: F) -> Self
    where
        S: Sources,
        F: Fn(S::Values) -> T + Send + Sync + 'static,
    {
        Self::with_equality(runtime, sources, f, T::eq)
    }
}

impl<T: Clone + Send + Sync + 'static> Computed<T> {
    /// Create a node that compares results with `eq` instead of `PartialEq`.
    pub fn with_equality<S, F>(runtime: &Runtime, sources: S, f: F, eq: fn(&T, &T) -> bool) -> Self
    where
        S: Sources,
        F: Fn(S::Values) -> T + Send + Sync + 'static,
    {
        let _critical = runtime.enter();

        let upstream = sources.handles();
        let rank = upstream.iter().map(NodeHandle::rank).max().unwrap_or(0) + 1;
        let seen: Vec<u64> = upstream.iter().map(NodeHandle::version).collect();

        let compute: Compute<T> = Box::new(move || f(sources.values()));
        let value = compute();

        let inner = Arc::new(ComputedInner {
            core: NodeCore::new(runtime.next_id(), rank),
            runtime: runtime.clone(),
            upstream,
            compute,
            eq,
            memo: Mutex::new(Memo {
                value,
                seen,
                version: 0,
                notified: 0,
            }),
            recomputations: AtomicU64::new(1),
            listeners: Listeners::new(),
        });

        let node: Arc<dyn Node> = inner.clone();
        let weak: Weak<dyn Node> = Arc::downgrade(&node);
        for handle in &inner.upstream {
            handle.add_dependent(weak.clone());
        }

        tracing::trace!(node = ?inner.core.id, rank, upstream = inner.upstream.len(), "Computed node created");
        Self { inner }
    }

    /// Current value, recomputed first if an upstream changed.
    pub fn get(&self) -> T {
        let _critical = self.inner.runtime.enter();
        self.inner.refresh().value.clone()
    }

    /// Register a listener called whenever the output changes.
    ///
    /// The listener is not called with the current value.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let _critical = self.inner.runtime.enter();
        if self.inner.listeners.is_empty() {
            // Start the delivery baseline at the value the subscriber can
            // already read.
            let mut memo = self.inner.refresh();
            memo.notified = memo.version;
        }
        self.inner.listeners.add(listener)
    }

    /// Number of output changes since construction.
    pub fn version(&self) -> u64 {
        let _critical = self.inner.runtime.enter();
        self.inner.refresh().version
    }

    /// How many times the combining function has run, construction included.
    pub fn recomputations(&self) -> u64 {
        self.inner.recomputations.load(Ordering::Relaxed)
    }

    pub fn id(&self) -> NodeId {
        self.inner.core.id
    }

    /// Distance from the furthest atom upstream.
    pub fn rank(&self) -> usize {
        self.inner.core.rank
    }

    /// Upstream node ids in declaration order.
    pub fn upstream_ids(&self) -> Vec<NodeId> {
        self.inner.upstream.iter().map(NodeHandle::id).collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<T: Clone + Send + Sync + 'static> ComputedInner<T> {
    /// Bring the memo up to date and hand back its lock.
    ///
    /// Upstream versions are read first; reading a computed upstream's
    /// version refreshes it, so by the time the combining function runs every
    /// input already holds its final value for this update.
    fn refresh(&self) -> MutexGuard<'_, Memo<T>> {
        let versions: Vec<u64> = self.upstream.iter().map(NodeHandle::version).collect();
        let mut memo = self.memo.lock();
        if memo.seen != versions {
            let next = (self.compute)();
            self.recomputations.fetch_add(1, Ordering::Relaxed);
            if !(self.eq)(&memo.value, &next) {
                memo.value = next;
                memo.version += 1;
            }
            memo.seen = versions;
        }
        memo
    }
}

impl<T: Clone + Send + Sync + 'static> Node for ComputedInner<T> {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn version(&self) -> u64 {
        self.refresh().version
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let value = {
            let mut memo = self.refresh();
            if memo.notified == memo.version {
                return;
            }
            memo.notified = memo.version;
            memo.value.clone()
        };
        self.listeners.emit(&value);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let memo = self.inner.memo.lock();
        f.debug_struct("Computed")
            .field("id", &self.inner.core.id)
            .field("rank", &self.inner.core.rank)
            .field("version", &memo.version)
            .field("value", &memo.value)
            .finish()
    }
}
