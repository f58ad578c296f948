//! Enrichment entry point for shared items.
//!
//! The [`Enricher`] owns the [`IdentifierResolver`] and guarantees that at most
//! one enrichment pass runs per item at a time. Callers that ask for an item
//! already being enriched wait for that pass and receive its report instead of
//! running their own. It also persists the provider caches across restarts.

use std::path::Path;
use std::sync::Arc;

use marquee_common::{Error, ItemId, MediaItem, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, RestoreReport, SingleFlight, SnapshotDocument};
use crate::config::Config;

use super::provider::{MovieShowProvider, SeriesProvider};
use super::resolver::{EnrichmentReport, IdentifierResolver};
use super::tmdb_cache::TmdbCache;
use super::tvdb_cache::TvdbCache;

/// A media item shared between the polling layer and enrichment.
///
/// Identity is the item id, fixed at construction; clones refer to the same
/// item.
#[derive(Debug, Clone)]
pub struct SharedItem {
    id: ItemId,
    inner: Arc<Mutex<MediaItem>>,
}

impl SharedItem {
    /// Wrap `item` for sharing.
    pub fn new(item: MediaItem) -> Self {
        Self {
            id: item.id,
            inner: Arc::new(Mutex::new(item)),
        }
    }

    /// The item's id.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Lock the item for reading or writing.
    pub async fn lock(&self) -> MutexGuard<'_, MediaItem> {
        self.inner.lock().await
    }

    /// A copy of the item's current state.
    pub async fn snapshot(&self) -> MediaItem {
        self.inner.lock().await.clone()
    }
}

impl From<MediaItem> for SharedItem {
    fn from(item: MediaItem) -> Self {
        Self::new(item)
    }
}

/// Outcome shared between a pass and the callers waiting on it.
type PassResult = std::result::Result<EnrichmentReport, Arc<Error>>;

/// Runs enrichment passes, one at a time per item.
///
/// # Example
///
/// ```rust,ignore
/// let enricher = Enricher::from_config(&config, series_provider, tmdb_provider);
/// let item = SharedItem::new(MediaItem::movie("Heat", 1995));
/// let report = enricher.enrich(&item, false).await?;
/// ```
pub struct Enricher {
    resolver: IdentifierResolver,
    passes: SingleFlight<ItemId, PassResult>,
}

impl Enricher {
    /// Create an enricher around `resolver`.
    pub fn new(resolver: IdentifierResolver) -> Self {
        Self {
            resolver,
            passes: SingleFlight::new(),
        }
    }

    /// Build the caches and resolver described by `config` over the given
    /// providers.
    pub fn from_config(
        config: &Config,
        series: Arc<dyn SeriesProvider>,
        movies: Arc<dyn MovieShowProvider>,
    ) -> Self {
        let policy = config.cache.failure_policy();
        let resolver = IdentifierResolver::new(
            TvdbCache::new(series, policy),
            TmdbCache::new(movies, policy),
        )
        .with_cast_imdb_ids(config.enrichment.resolve_cast_imdb_ids);
        Self::new(resolver)
    }

    /// The resolver passes run through.
    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    /// Run an enrichment pass over `item`, or wait for the one already running.
    ///
    /// A caller that joins a running pass receives that pass's report even if
    /// it asked for `force` and the running pass did not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the item cannot be enriched at all.
    /// Provider failures are not errors.
    pub async fn enrich(&self, item: &SharedItem, force: bool) -> Result<EnrichmentReport> {
        let item_id = item.id();
        let outcome = self
            .passes
            .run(item_id, || async {
                debug!(item_id = %item_id, force, "Starting enrichment pass");
                let mut guard = item.lock().await;
                self.resolver.resolve(&mut guard, force).await.map_err(Arc::new)
            })
            .await;

        outcome.map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.duplicate()))
    }

    /// Number of items with a pass currently running.
    pub fn passes_in_flight(&self) -> usize {
        self.passes.in_flight()
    }

    /// Entry counts for every provider cache.
    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        let mut stats = self.resolver.tvdb().stats();
        stats.extend(self.resolver.tmdb().stats());
        stats
    }

    /// Drop expired failure entries from every provider cache.
    pub fn purge_expired(&self) {
        self.resolver.tvdb().purge_expired();
        self.resolver.tmdb().purge_expired();
    }

    /// Snapshot every provider cache into one document.
    pub fn dump_snapshot(&self) -> Result<SnapshotDocument> {
        let mut doc = SnapshotDocument::new();
        self.resolver.tvdb().dump_into(&mut doc)?;
        self.resolver.tmdb().dump_into(&mut doc)?;
        Ok(doc)
    }

    /// Restore every provider cache present in `doc`.
    ///
    /// Caches whose body cannot be read stay empty; the others are restored.
    pub fn load_snapshot(&self, doc: &SnapshotDocument) -> RestoreReport {
        let mut report = RestoreReport::default();
        self.resolver.tvdb().restore_from(doc, &mut report);
        self.resolver.tmdb().restore_from(doc, &mut report);

        if !report.failed.is_empty() {
            warn!(failed = ?report.failed, "Some caches could not be restored");
        }
        report
    }

    /// Restore from a serialized snapshot document. An unreadable document
    /// restores nothing.
    pub fn load_snapshot_json(&self, json: &str) -> RestoreReport {
        match SnapshotDocument::parse(json) {
            Ok(doc) => self.load_snapshot(&doc),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cache snapshot");
                RestoreReport::default()
            }
        }
    }

    /// Write the snapshot document to `path`.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        self.dump_snapshot()?.save(path)
    }

    /// Restore from the snapshot document at `path`. A missing or unreadable
    /// file restores nothing.
    pub fn load_snapshot_file(&self, path: &Path) -> RestoreReport {
        let report = self.load_snapshot(&SnapshotDocument::load_or_empty(path));
        info!(restored = report.total(), "Restored provider caches");
        report
    }
}
