//! Typed in-memory indexes mirroring external resource collections, and the
//! composite readiness barrier the dispatcher waits on before processing
//! any request (spec §4.1).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A read-only, snapshot-style lookup over one resource kind's live
/// collection, mirroring `kube::runtime::reflector::Store`'s contract:
/// a lookup observes at least the state present when `synced()` first
/// flipped, but later writes may or may not be visible yet. No write path
/// is exposed here — filling the index is the transport's watch loop.
pub trait CacheIndex<K>: Send + Sync {
    fn get(&self, namespace: &str, name: &str) -> Option<K>;

    /// Every currently-indexed object, in no particular guaranteed order
    /// beyond "stable for one snapshot".
    fn list(&self) -> Vec<K>;

    /// Whether this index has completed its initial fill.
    fn synced(&self) -> bool;
}

/// An in-memory fake used by tests and by any caller that wants a
/// `CacheIndex` without a live watch loop behind it.
#[derive(Debug, Default)]
pub struct FakeIndex<K> {
    items: std::sync::RwLock<Vec<(String, String, K)>>,
    synced: AtomicBool,
}

impl<K: Clone> FakeIndex<K> {
    pub fn new() -> Self {
        Self {
            items: std::sync::RwLock::new(Vec::new()),
            synced: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, namespace: impl Into<String>, name: impl Into<String>, value: K) {
        self.items
            .write()
            .expect("cache lock poisoned")
            .push((namespace.into(), name.into(), value));
    }

    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }
}

impl<K: Clone + Send + Sync> CacheIndex<K> for FakeIndex<K> {
    fn get(&self, namespace: &str, name: &str) -> Option<K> {
        self.items
            .read()
            .expect("cache lock poisoned")
            .iter()
            .find(|(ns, n, _)| ns == namespace && n == name)
            .map(|(_, _, v)| v.clone())
    }

    fn list(&self) -> Vec<K> {
        self.items
            .read()
            .expect("cache lock poisoned")
            .iter()
            .map(|(_, _, v)| v.clone())
            .collect()
    }

    fn synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

/// A `synced()` predicate registered with the [`ReadinessGate`]. Boxed so
/// the gate can hold predicates from indexes of heterogeneous `K`.
pub type SyncedPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Composes every registered index's `synced()` predicate into one
/// `ready()` barrier. While `ready()` is false, the dispatcher must
/// short-circuit every request with `Forbid::not_ready()` (§4.4).
#[derive(Clone, Default)]
pub struct ReadinessGate {
    predicates: Arc<std::sync::RwLock<Vec<SyncedPredicate>>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an index's `synced()` predicate with the gate. Called
    /// during plugin initialization (§4.3 step 4, "cache registration").
    pub fn register<K, I>(&self, index: Arc<I>)
    where
        K: 'static,
        I: CacheIndex<K> + 'static,
    {
        self.predicates
            .write()
            .expect("readiness gate lock poisoned")
            .push(Arc::new(move || index.synced()));
    }

    /// Registers a raw `synced()` predicate, for callers (such as
    /// `admission-runtime`'s plugin registry) that track readiness through
    /// something other than a concrete `CacheIndex<K>`.
    pub fn register_predicate(&self, predicate: SyncedPredicate) {
        self.predicates.write().expect("readiness gate lock poisoned").push(predicate);
    }

    /// True only once every registered index has completed its initial fill.
    pub fn ready(&self) -> bool {
        self.predicates
            .read()
            .expect("readiness gate lock poisoned")
            .iter()
            .all(|synced| synced())
    }

    /// Polls `ready()` until it flips true or the deadline elapses.
    pub async fn wait_until_ready(&self, poll_interval: std::time::Duration) {
        while !self.ready() {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
