//! Dependency-tracked reactive cells.
//!
//! The graph is built from two kinds of nodes:
//!
//! - **[`Atom`]**: a mutable root cell. `set` commits a new value and, when the
//!   value actually changed, notifies subscribers.
//! - **[`Computed`]**: a read-only cell derived from an explicit tuple of
//!   upstream cells. The value is memoized and only recomputed when an
//!   upstream version moved; subscribers hear about it only when the output
//!   changed.
//!
//! Every node belongs to a [`Runtime`], which owns the commit/notify critical
//! section. Notifications for one commit finish before the next commit's
//! notifications begin, and [`Runtime::batch`] folds several commits into a
//! single notification epoch.
//!
//! ```
//! use feedstate::reactive::{Atom, Computed, Runtime};
//!
//! let rt = Runtime::new();
//! let a = Atom::new(&rt, 2);
//! let b = Atom::new(&rt, 3);
//! let sum = Computed::new(&rt, (a.clone(), b.clone()), |(a, b)| a + b);
//! assert_eq!(sum.get(), 5);
//!
//! rt.batch(|| {
//!     a.set(10);
//!     b.set(20);
//! });
//! assert_eq!(sum.get(), 30);
//! ```

mod atom;
mod computed;
mod runtime;
mod subscription;

pub use atom::Atom;
pub use computed::{Computed, Source, Sources};
pub use runtime::{NodeHandle, NodeId, Runtime};
pub use subscription::Subscription;
