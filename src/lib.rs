//! Reactive derived state for a feed reader.
//!
//! Root atoms hold feeds, per-feed counts, display settings and the active
//! filter; memoized computed nodes derive the visible, filtered and grouped
//! views from them. [`FeedStore::load_feeds`](store::FeedStore::load_feeds)
//! refreshes the atoms from a [`Storage`](storage::Storage) backend.
pub mod config;
pub mod derivations;
pub mod loader;
pub mod model;
pub mod reactive;
pub mod storage;
pub mod store;

pub use loader::{LoadError, LoadSummary, LOAD_FAILED_MESSAGE};
pub use store::FeedStore;
