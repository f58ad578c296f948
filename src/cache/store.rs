//! Keyed provider cache with negative entries.
//!
//! [`ProviderCache`] memoizes provider lookups. Successful values are kept for
//! the life of the cache; failures are kept as timestamped misses that expire
//! according to a [`FailurePolicy`]. Concurrent lookups of the same key share a
//! single factory call; lookups of different keys never wait on each other's
//! network calls, because the map is only locked while an entry is read or
//! written.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use marquee_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, FailurePolicy, MissReason};
use super::singleflight::SingleFlight;
use super::snapshot::{RestoreReport, SnapshotDocument};

/// A key that can be written into a snapshot.
///
/// Single provider ids encode as themselves; composite keys encode as an
/// ordered JSON array of their components.
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Portable string form of this key.
    fn encode(&self) -> Result<String>;

    /// Parse a key previously produced by [`encode`](Self::encode).
    fn decode(raw: &str) -> Result<Self>;
}

impl CacheKey for String {
    fn encode(&self) -> Result<String> {
        if self.is_empty() {
            return Err(Error::invalid_key("empty provider id"));
        }
        Ok(self.clone())
    }

    fn decode(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_key("empty provider id"));
        }
        Ok(raw.to_string())
    }
}

/// A value that can be written into a snapshot.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Version of the serialized shape. Snapshot entries written under a
    /// different version are ignored on load.
    const SCHEMA_VERSION: u32;
}

/// Envelope stored per entry in a snapshot body.
#[derive(Debug, Serialize, Deserialize)]
struct VersionedEntry<T> {
    version: u32,
    value: T,
}

/// Counts describing a cache's contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Successful entries.
    pub hits: usize,
    /// Failure entries, expired or not.
    pub misses: usize,
}

/// Memoizes `K -> V` lookups against a provider, including failures.
pub struct ProviderCache<K, V> {
    name: &'static str,
    entries: DashMap<K, CacheEntry<V>>,
    flights: SingleFlight<K, Option<V>>,
    policy: FailurePolicy,
    clock: Arc<dyn Clock>,
}

impl<K, V> ProviderCache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    /// Create an empty cache using the system clock.
    pub fn new(name: &'static str, policy: FailurePolicy) -> Self {
        Self::with_clock(name, policy, Arc::new(SystemClock))
    }

    /// Create an empty cache with an explicit clock.
    pub fn with_clock(name: &'static str, policy: FailurePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            flights: SingleFlight::new(),
            policy,
            clock,
        }
    }

    /// Logical name of this cache, used as its snapshot section.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the cached value for `key`, or run `factory` to produce it.
    ///
    /// - A hit returns immediately without calling `factory`.
    /// - A miss younger than the policy TTL returns `None` without calling
    ///   `factory`.
    /// - Otherwise `factory` runs once (shared with any concurrent caller for
    ///   the same key) and its outcome is stored: `Ok(Some)` as a hit,
    ///   `Ok(None)` as a not-found miss, `Err` as an unavailable miss.
    pub async fn get_or_add<F, Fut>(&self, key: &K, factory: F) -> Option<V>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<V>>>,
    {
        if let Some(cached) = self.lookup(key) {
            return cached;
        }

        self.flights
            .run(key.clone(), move || async move {
                // Another flight may have stored an outcome since the first check.
                if let Some(cached) = self.lookup(key) {
                    return cached;
                }
                let outcome = factory(key.clone()).await;
                self.record(key, outcome)
            })
            .await
    }

    /// Like [`get_or_add`](Self::get_or_add), but a hit for which `is_current`
    /// returns `false` is re-fetched.
    ///
    /// A successful re-fetch replaces the stale hit. A failed re-fetch keeps
    /// and returns the stale hit; success is never downgraded to a miss.
    pub async fn get_or_refresh<P, F, Fut>(&self, key: &K, is_current: P, factory: F) -> Option<V>
    where
        P: Fn(&V) -> bool,
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<V>>>,
    {
        match self.lookup(key) {
            Some(Some(value)) if is_current(&value) => return Some(value),
            Some(None) => return None,
            _ => {}
        }

        self.flights
            .run(key.clone(), move || async move {
                let stale = match self.lookup(key) {
                    Some(Some(value)) if is_current(&value) => return Some(value),
                    Some(None) => return None,
                    Some(Some(value)) => Some(value),
                    None => None,
                };

                match (factory(key.clone()).await, stale) {
                    (Ok(Some(fresh)), _) => {
                        debug!(cache = self.name, key = ?key, "Replaced stale entry");
                        self.entries.insert(key.clone(), CacheEntry::Hit(fresh.clone()));
                        Some(fresh)
                    }
                    (Ok(None), Some(stale)) => Some(stale),
                    (Err(e), Some(stale)) => {
                        warn!(cache = self.name, key = ?key, error = %e, "Refresh failed; keeping cached value");
                        Some(stale)
                    }
                    (outcome, None) => self.record(key, outcome),
                }
            })
            .await
    }

    /// Install a hit for `key`, replacing whatever was there.
    ///
    /// Used when a value becomes known through a different lookup path.
    pub fn add(&self, key: K, value: V) {
        debug!(cache = self.name, key = ?key, "Adding entry");
        self.entries.insert(key, CacheEntry::Hit(value));
    }

    /// The cached value for `key`, if there is a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|e| e.value().value().cloned())
    }

    /// The raw entry for `key`.
    pub fn entry(&self, key: &K) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Remove any entry for `key`.
    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop failure entries whose TTL has elapsed.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| match entry {
            CacheEntry::Hit(_) => true,
            CacheEntry::Miss { failed_at, reason } => self.policy.is_fresh(*reason, *failed_at, now),
        });
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, hits and misses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit / miss counts.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            if entry.is_hit() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
        stats
    }

    /// Number of keys with a factory call currently running.
    pub fn lookups_in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Serialize every hit into a snapshot body.
    ///
    /// Failure entries and entries whose key cannot be encoded are not
    /// persisted. Keys are written in sorted order.
    pub fn dump_snapshot(&self) -> Result<String> {
        let mut body = BTreeMap::new();
        for entry in self.entries.iter() {
            let CacheEntry::Hit(value) = entry.value() else {
                continue;
            };
            let versioned = VersionedEntry {
                version: V::SCHEMA_VERSION,
                value,
            };
            let key = match entry.key().encode() {
                Ok(key) => key,
                Err(e) => {
                    warn!(cache = self.name, key = ?entry.key(), error = %e, "Not persisting entry");
                    continue;
                }
            };
            body.insert(key, serde_json::to_value(&versioned)?);
        }
        Ok(serde_json::to_string(&body)?)
    }

    /// Restore hits from a snapshot body produced by
    /// [`dump_snapshot`](Self::dump_snapshot).
    ///
    /// Never fails: an unparseable body restores nothing, an unparseable entry
    /// is skipped, and an entry with a different schema version is treated as
    /// absent. Returns the number of entries restored.
    pub fn load_snapshot(&self, body: &str) -> usize {
        match self.try_load_snapshot(body) {
            Ok(restored) => restored,
            Err(e) => {
                warn!(cache = self.name, error = %e, "Failed to load cache snapshot; starting empty");
                0
            }
        }
    }

    /// Strict form of [`load_snapshot`](Self::load_snapshot): a body that is
    /// not a JSON object is an error, individual bad entries are still skipped.
    pub fn try_load_snapshot(&self, body: &str) -> Result<usize> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(body)?;

        let mut restored = 0;
        for (raw_key, raw_value) in raw {
            let key = match K::decode(&raw_key) {
                Ok(key) => key,
                Err(e) => {
                    warn!(cache = self.name, key = %raw_key, error = %e, "Skipping snapshot entry");
                    continue;
                }
            };

            let versioned: VersionedEntry<serde_json::Value> = match serde_json::from_value(raw_value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(cache = self.name, key = %raw_key, error = %e, "Skipping snapshot entry");
                    continue;
                }
            };

            if versioned.version != V::SCHEMA_VERSION {
                debug!(
                    cache = self.name,
                    key = %raw_key,
                    found = versioned.version,
                    expected = V::SCHEMA_VERSION,
                    "Ignoring snapshot entry from another schema version"
                );
                continue;
            }

            match serde_json::from_value::<V>(versioned.value) {
                Ok(value) => {
                    self.entries.insert(key, CacheEntry::Hit(value));
                    restored += 1;
                }
                Err(e) => {
                    warn!(cache = self.name, key = %raw_key, error = %e, "Skipping snapshot entry");
                }
            }
        }

        debug!(cache = self.name, restored, "Loaded cache snapshot");
        Ok(restored)
    }

    /// Write this cache's body into `doc` under the cache name.
    pub fn dump_into(&self, doc: &mut SnapshotDocument) -> Result<()> {
        doc.insert(self.name, self.dump_snapshot()?);
        Ok(())
    }

    /// Restore this cache from its body in `doc`, if present.
    ///
    /// A body that cannot be parsed leaves the cache as it was and is recorded
    /// in `report.failed`.
    pub fn restore_from(&self, doc: &SnapshotDocument, report: &mut RestoreReport) {
        let Some(body) = doc.get(self.name) else {
            return;
        };
        match self.try_load_snapshot(body) {
            Ok(restored) => {
                report.restored.insert(self.name.to_string(), restored);
            }
            Err(e) => {
                warn!(cache = self.name, error = %e, "Failed to load cache snapshot; starting empty");
                report.failed.push(self.name.to_string());
            }
        }
    }

    /// `Some(Some(v))` for a hit, `Some(None)` for a live miss, `None` when the
    /// key is absent or its miss has expired.
    fn lookup(&self, key: &K) -> Option<Option<V>> {
        let entry = self.entries.get(key)?;
        match entry.value() {
            CacheEntry::Hit(value) => {
                debug!(cache = self.name, key = ?key, "Cache hit");
                Some(Some(value.clone()))
            }
            CacheEntry::Miss { failed_at, reason }
                if self.policy.is_fresh(*reason, *failed_at, self.clock.now()) =>
            {
                debug!(cache = self.name, key = ?key, reason = ?reason, "Cached failure");
                Some(None)
            }
            CacheEntry::Miss { .. } => {
                debug!(cache = self.name, key = ?key, "Cached failure expired");
                None
            }
        }
    }

    /// Store the outcome of a factory call. An existing hit always wins.
    fn record(&self, key: &K, outcome: anyhow::Result<Option<V>>) -> Option<V> {
        let fresh = match outcome {
            Ok(Some(value)) => CacheEntry::Hit(value),
            Ok(None) => {
                debug!(cache = self.name, key = ?key, "Provider has no data");
                self.miss(MissReason::NotFound)
            }
            Err(e) => {
                warn!(cache = self.name, key = ?key, error = %e, "Provider lookup failed");
                self.miss(MissReason::Unavailable)
            }
        };

        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let CacheEntry::Hit(existing) = occupied.get() {
                    return Some(existing.clone());
                }
                let value = fresh.value().cloned();
                occupied.insert(fresh);
                value
            }
            Entry::Vacant(vacant) => {
                let value = fresh.value().cloned();
                vacant.insert(fresh);
                value
            }
        }
    }

    fn miss(&self, reason: MissReason) -> CacheEntry<V> {
        CacheEntry::Miss {
            failed_at: self.clock.now(),
            reason,
        }
    }
}
