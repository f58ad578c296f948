//! Per-key single-flight coordination.
//!
//! The first caller for a key becomes the *leader* and runs the work; callers
//! that arrive while the leader is running become *followers* and receive the
//! leader's result instead of repeating the work. The registration is a
//! [`Lease`] released on drop, so a leader that errors, panics or is
//! cancelled never leaves the key stuck. If a leader goes away without a
//! result, one of its followers takes over.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Registry of in-flight work keyed by `K`, sharing results of type `V`.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, watch::Receiver<Option<V>>>>,
}

/// Outcome of [`SingleFlight::enter`].
pub enum Flight<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// No work was registered; the caller must do it and call [`Lease::complete`].
    Leader(Lease<'a, K, V>),
    /// Work is already running; await the result with [`wait_for_leader`].
    Follower(watch::Receiver<Option<V>>),
}

/// Registration held by the leader for one key.
///
/// Dropping the lease unregisters the key on every exit path.
pub struct Lease<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    owner: &'a SingleFlight<K, V>,
    key: K,
    tx: watch::Sender<Option<V>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Register interest in `key`.
    ///
    /// The membership check and insert happen under one lock.
    pub fn enter(&self, key: K) -> Flight<'_, K, V> {
        let mut inflight = self.inflight.lock();
        if let Some(rx) = inflight.get(&key) {
            return Flight::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key.clone(), rx);
        Flight::Leader(Lease {
            owner: self,
            key,
            tx,
        })
    }

    /// Run `work` for `key` unless it is already running, sharing its result.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        loop {
            let rx = match self.enter(key.clone()) {
                Flight::Leader(lease) => {
                    let value = work().await;
                    lease.complete(value.clone());
                    return value;
                }
                Flight::Follower(rx) => rx,
            };

            debug!(key = ?key, "Joining in-flight work");
            if let Some(value) = wait_for_leader(rx).await {
                return value;
            }
            debug!(key = ?key, "Leader went away without a result; retrying");
        }
    }

    /// Number of keys with work currently registered.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Whether work for `key` is currently registered.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.lock().contains_key(key)
    }

    fn release(&self, key: &K) {
        self.inflight.lock().remove(key);
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Lease<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// The key this lease holds.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Publish `value` to every follower and release the key.
    pub fn complete(self, value: V) {
        self.tx.send_replace(Some(value));
    }
}

impl<K, V> Drop for Lease<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}

/// Wait for the leader behind `rx` to publish a result.
///
/// Returns `None` if the leader was dropped before completing.
pub async fn wait_for_leader<V: Clone>(mut rx: watch::Receiver<Option<V>>) -> Option<V> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    }
}
