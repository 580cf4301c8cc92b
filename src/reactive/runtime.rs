use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// ============================================================================
// Node Plumbing
// ============================================================================

/// Identifier assigned to a node when it is constructed.
///
/// Ids increase with construction order, which makes them a stable
/// tie-breaker when ordering notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Behaviour shared by atoms and computed nodes.
pub(crate) trait Node: Send + Sync {
    fn core(&self) -> &NodeCore;

    /// Current version. Derived nodes bring themselves up to date first.
    fn version(&self) -> u64;

    /// Deliver a pending change to listeners, if there is one.
    fn notify(&self);
}

/// Graph bookkeeping embedded in every node.
pub(crate) struct NodeCore {
    pub(crate) id: NodeId,
    /// Atoms are rank 0; a computed node sits one above its highest upstream.
    pub(crate) rank: usize,
    dependents: Mutex<Vec<Weak<dyn Node>>>,
}

impl NodeCore {
    pub(crate) fn new(id: NodeId, rank: usize) -> Self {
        Self {
            id,
            rank,
            dependents: Mutex::new(Vec::new()),
        }
    }

    fn add_dependent(&self, dependent: Weak<dyn Node>) {
        self.dependents.lock().push(dependent);
    }

    /// Upgrade dependents, pruning the ones that were dropped.
    fn live_dependents(&self) -> Vec<Arc<dyn Node>> {
        let mut dependents = self.dependents.lock();
        let mut live = Vec::with_capacity(dependents.len());
        dependents.retain(|weak| match weak.upgrade() {
            Some(node) => {
                live.push(node);
                true
            }
            None => false,
        });
        live
    }
}

/// Opaque reference to a node, used to declare upstream edges.
#[derive(Clone)]
pub struct NodeHandle(Arc<dyn Node>);

impl NodeHandle {
    pub(crate) fn new(node: Arc<dyn Node>) -> Self {
        Self(node)
    }

    pub fn id(&self) -> NodeId {
        self.0.core().id
    }

    pub fn rank(&self) -> usize {
        self.0.core().rank
    }

    pub(crate) fn version(&self) -> u64 {
        self.0.version()
    }

    pub(crate) fn add_dependent(&self, dependent: Weak<dyn Node>) {
        self.0.core().add_dependent(dependent);
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id())
            .field("rank", &self.rank())
            .finish()
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Shared commit/notify context for a graph of atoms and computed nodes.
///
/// All reads, commits and notification rounds run inside a reentrant critical
/// section, so a thread never observes another thread's batch half applied,
/// and a listener may read or write cells of the same runtime. A `set` made
/// from inside a listener is queued and delivered after the current round.
///
/// Cloning is cheap; clones share the same graph state.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    critical: ReentrantMutex<()>,
    queue: Mutex<Queue>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Queue {
    batch_depth: usize,
    flushing: bool,
    pending: Vec<Arc<dyn Node>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.inner.queue.lock();
        f.debug_struct("Runtime")
            .field("batch_depth", &queue.batch_depth)
            .field("pending", &queue.pending.len())
            .field("nodes", &self.inner.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                critical: ReentrantMutex::new(()),
                queue: Mutex::new(Queue::default()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Run `f` with notifications deferred until it returns.
    ///
    /// Every atom committed inside the batch is notified once, after the
    /// outermost batch ends, with its final value. Other threads are held off
    /// for the whole batch, so they see either none or all of its commits.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let _critical = self.enter();
        self.inner.queue.lock().batch_depth += 1;
        let _batch = BatchGuard { runtime: self };
        f()
    }

    /// Whether the calling code runs inside [`Runtime::batch`].
    pub fn in_batch(&self) -> bool {
        self.inner.queue.lock().batch_depth > 0
    }

    /// Whether two handles refer to the same graph.
    pub fn same(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn enter(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.critical.lock()
    }

    pub(crate) fn next_id(&self) -> NodeId {
        NodeId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue a committed node and flush unless a batch or a flush is active.
    ///
    /// Callers hold the critical section.
    pub(crate) fn commit(&self, source: Arc<dyn Node>) {
        let should_flush = {
            let mut queue = self.inner.queue.lock();
            queue.pending.push(source);
            Self::claim_flush(&mut queue)
        };
        if should_flush {
            self.flush();
        }
    }

    fn claim_flush(queue: &mut Queue) -> bool {
        if queue.batch_depth > 0 || queue.flushing || queue.pending.is_empty() {
            return false;
        }
        queue.flushing = true;
        true
    }

    /// Drain the pending queue round by round.
    ///
    /// Each round notifies the committed atoms and everything downstream of
    /// them, ordered by rank so an upstream is always settled before a
    /// dependent reads it. Commits made by listeners land in the next round.
    fn flush(&self) {
        let _flushing = FlushGuard { runtime: self };
        let mut rounds = 0usize;
        loop {
            let roots = {
                let mut queue = self.inner.queue.lock();
                if queue.pending.is_empty() {
                    break;
                }
                std::mem::take(&mut queue.pending)
            };
            rounds += 1;
            let affected = Self::affected(roots);
            tracing::trace!(round = rounds, nodes = affected.len(), "Notifying reactive nodes");
            for node in affected {
                node.notify();
            }
        }
    }

    /// Committed nodes plus their transitive dependents, deduplicated and
    /// sorted by `(rank, id)`.
    fn affected(roots: Vec<Arc<dyn Node>>) -> Vec<Arc<dyn Node>> {
        let mut seen: HashMap<NodeId, Arc<dyn Node>> = HashMap::new();
        let mut stack = roots;
        while let Some(node) = stack.pop() {
            let id = node.core().id;
            if seen.contains_key(&id) {
                continue;
            }
            stack.extend(node.core().live_dependents());
            seen.insert(id, node);
        }

        let mut ordered: Vec<Arc<dyn Node>> = seen.into_values().collect();
        ordered.sort_by_key(|node| (node.core().rank, node.core().id));
        ordered
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let should_flush = {
            let mut queue = self.runtime.inner.queue.lock();
            queue.batch_depth -= 1;
            !std::thread::panicking() && Runtime::claim_flush(&mut queue)
        };
        if should_flush {
            self.runtime.flush();
        }
    }
}

struct FlushGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.runtime.inner.queue.lock();
        queue.flushing = false;
        if std::thread::panicking() {
            queue.pending.clear();
        }
    }
}
