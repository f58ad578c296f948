//! Cached access to the series provider.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use marquee_common::Result;
use tracing::debug;

use crate::cache::{
    CacheStats, Clock, FailurePolicy, MissReason, ProviderCache, RestoreReport, SnapshotDocument, SystemClock,
};

use super::provider::{Series, SeriesProvider};

/// Snapshot section holding series by provider id.
pub const SERIES_CACHE: &str = "tvdb.series";

/// Series lookups, cached by series id.
///
/// A cached series that does not list the requested episode is re-fetched, so
/// episodes aired after the series was first cached are picked up. A failed
/// re-fetch keeps the cached series. An episode the provider still does not
/// list is not asked for again until the not-found TTL elapses.
pub struct TvdbCache {
    provider: Arc<dyn SeriesProvider>,
    series: ProviderCache<String, Series>,
    /// When each (series id, season, episode) was last found missing.
    unlisted: DashMap<(String, u32, u32), DateTime<Utc>>,
    policy: FailurePolicy,
    clock: Arc<dyn Clock>,
}

impl TvdbCache {
    /// Create a cache in front of `provider`.
    pub fn new(provider: Arc<dyn SeriesProvider>, policy: FailurePolicy) -> Self {
        Self::with_clock(provider, policy, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    pub fn with_clock(provider: Arc<dyn SeriesProvider>, policy: FailurePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            series: ProviderCache::with_clock(SERIES_CACHE, policy, clock.clone()),
            unlisted: DashMap::new(),
            policy,
            clock,
        }
    }

    /// Series `id`, guaranteed to list `season` / `episode` if the provider
    /// knows it.
    pub async fn get_series(&self, id: &str, season: Option<u32>, episode: Option<u32>) -> Option<Series> {
        if id.is_empty() {
            return None;
        }

        let unlisted_key = season.zip(episode).map(|(s, e)| (id.to_string(), s, e));
        if let Some(key) = &unlisted_key {
            if self.recently_unlisted(key) {
                if let Some(cached) = self.series.get(&key.0) {
                    debug!(series_id = id, ?season, ?episode, "Episode recently unlisted; using cached series");
                    return Some(cached);
                }
            }
        }

        debug!(provider = self.provider.name(), series_id = id, ?season, ?episode, "Series lookup");
        let provider = &self.provider;
        let series = self
            .series
            .get_or_refresh(
                &id.to_string(),
                |series| series.covers(season, episode),
                |id| async move { provider.get_series(&id, season, episode).await },
            )
            .await;

        if let Some(key) = unlisted_key {
            match &series {
                Some(found) if !found.covers(season, episode) => {
                    self.unlisted.insert(key, self.clock.now());
                }
                _ => {
                    self.unlisted.remove(&key);
                }
            }
        }
        series
    }

    fn recently_unlisted(&self, key: &(String, u32, u32)) -> bool {
        self.unlisted
            .get(key)
            .map(|at| self.policy.is_fresh(MissReason::NotFound, *at, self.clock.now()))
            .unwrap_or(false)
    }

    /// The underlying series cache.
    pub fn series(&self) -> &ProviderCache<String, Series> {
        &self.series
    }

    /// Per-cache entry counts.
    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![(self.series.name(), self.series.stats())]
    }

    /// Drop expired failure entries.
    pub fn purge_expired(&self) {
        self.series.purge_expired();
        let now = self.clock.now();
        self.unlisted
            .retain(|_, at| self.policy.is_fresh(MissReason::NotFound, *at, now));
    }

    /// Write every cache into `doc`.
    pub fn dump_into(&self, doc: &mut SnapshotDocument) -> Result<()> {
        self.series.dump_into(doc)
    }

    /// Restore every cache present in `doc`.
    pub fn restore_from(&self, doc: &SnapshotDocument, report: &mut RestoreReport) {
        self.series.restore_from(doc, report);
    }
}
