//! Cached access to the movie/show provider.
//!
//! Which lookup runs depends on the ids already known for the item:
//!
//! | known ids                 | lookup                                        |
//! |---------------------------|-----------------------------------------------|
//! | tmdb                      | by id, cached by id                           |
//! | none (no imdb / tvdb)     | title search, uncached; result indexed        |
//! | imdb and/or tvdb, no tmdb | title search, cached by a composite title key |
//!
//! A successful lookup is indexed under both its provider id and its title key,
//! so the next pass for the same item is a plain cache hit whichever path it
//! takes.

use std::sync::Arc;

use marquee_common::{MediaItem, Result};
use tracing::{debug, warn};

use crate::cache::{CacheStats, Clock, FailurePolicy, ProviderCache, RestoreReport, SnapshotDocument, SystemClock};

use super::keys::{MovieTitleKey, ShowEpisodeKey, ShowTitleKey};
use super::provider::{Movie, MovieShowProvider, Person, Show};

/// Snapshot section holding movies by id.
pub const MOVIES_CACHE: &str = "tmdb.movies";
/// Snapshot section holding movies by title key.
pub const MOVIES_BY_TITLE_CACHE: &str = "tmdb.movies_by_title";
/// Snapshot section holding show episodes by id.
pub const SHOWS_CACHE: &str = "tmdb.shows";
/// Snapshot section holding show episodes by title key.
pub const SHOWS_BY_TITLE_CACHE: &str = "tmdb.shows_by_title";
/// Snapshot section holding people by id.
pub const PEOPLE_CACHE: &str = "tmdb.people";

/// Movie, show and person lookups with their caches.
pub struct TmdbCache {
    provider: Arc<dyn MovieShowProvider>,
    movies: ProviderCache<String, Movie>,
    movies_by_title: ProviderCache<MovieTitleKey, Movie>,
    shows: ProviderCache<ShowEpisodeKey, Show>,
    shows_by_title: ProviderCache<ShowTitleKey, Show>,
    people: ProviderCache<String, Person>,
}

impl TmdbCache {
    /// Create caches in front of `provider`.
    pub fn new(provider: Arc<dyn MovieShowProvider>, policy: FailurePolicy) -> Self {
        Self::with_clock(provider, policy, Arc::new(SystemClock))
    }

    /// Create caches with an explicit clock.
    pub fn with_clock(
        provider: Arc<dyn MovieShowProvider>,
        policy: FailurePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            movies: ProviderCache::with_clock(MOVIES_CACHE, policy, Arc::clone(&clock)),
            movies_by_title: ProviderCache::with_clock(MOVIES_BY_TITLE_CACHE, policy, Arc::clone(&clock)),
            shows: ProviderCache::with_clock(SHOWS_CACHE, policy, Arc::clone(&clock)),
            shows_by_title: ProviderCache::with_clock(SHOWS_BY_TITLE_CACHE, policy, Arc::clone(&clock)),
            people: ProviderCache::with_clock(PEOPLE_CACHE, policy, clock),
        }
    }

    /// Find the movie `item` refers to.
    pub async fn get_movie(&self, item: &MediaItem) -> Option<Movie> {
        let ids = &item.external_ids;
        let provider = &self.provider;

        if let Some(tmdb) = ids.tmdb() {
            debug!(item_id = %item.id, tmdb_id = tmdb, "Movie lookup by id");
            let found = self
                .movies
                .get_or_add(&tmdb.to_string(), |id| async move { provider.get_movie(&id).await })
                .await;
            if let Some(movie) = found {
                self.movies_by_title
                    .add(MovieTitleKey::new(item, movie.imdb_id.as_deref()), movie.clone());
                return Some(movie);
            }
        }

        if !ids.has_imdb() {
            debug!(item_id = %item.id, title = %item.title, year = ?item.year, "Movie title search");
            let movie = match provider.search_movie(&item.title, item.year, ids).await {
                Ok(found) => found?,
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Movie search failed");
                    return None;
                }
            };
            self.index_movie(item, &movie);
            return Some(movie);
        }

        let key = MovieTitleKey::new(item, ids.imdb());
        debug!(item_id = %item.id, key = ?key, "Movie lookup by title key");
        let movie = self
            .movies_by_title
            .get_or_add(&key, |_| async move {
                provider.search_movie(&item.title, item.year, ids).await
            })
            .await?;
        self.add_movie_by_id(&movie);
        Some(movie)
    }

    /// Find the show episode `item` refers to.
    pub async fn get_show(&self, item: &MediaItem) -> Option<Show> {
        let ids = &item.external_ids;
        let provider = &self.provider;

        if let Some(tmdb) = ids.tmdb() {
            debug!(item_id = %item.id, tmdb_id = tmdb, "Show lookup by id");
            let found = self
                .shows
                .get_or_add(&ShowEpisodeKey::new(tmdb, item), |key| async move {
                    provider.get_show(&key.0, key.1, key.2).await
                })
                .await;
            if let Some(show) = found {
                self.shows_by_title
                    .add(ShowTitleKey::new(item, &show.show_ids), show.clone());
                return Some(show);
            }
        }

        if !ids.has_imdb() && !ids.has_tvdb() {
            debug!(item_id = %item.id, show = item.search_title(), "Show title search");
            let show = match provider
                .search_show(item.search_title(), item.year, ids, item.season, item.episode)
                .await
            {
                Ok(found) => found?,
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Show search failed");
                    return None;
                }
            };
            self.index_show(item, &show);
            return Some(show);
        }

        let key = ShowTitleKey::new(item, ids);
        debug!(item_id = %item.id, key = ?key, "Show lookup by title key");
        let show = self
            .shows_by_title
            .get_or_add(&key, |_| async move {
                provider
                    .search_show(item.search_title(), item.year, ids, item.season, item.episode)
                    .await
            })
            .await?;
        self.add_show_by_id(item, &show);
        Some(show)
    }

    /// Find person `id`.
    pub async fn get_person(&self, id: &str) -> Option<Person> {
        if id.is_empty() {
            return None;
        }
        let provider = &self.provider;
        self.people
            .get_or_add(&id.to_string(), |id| async move { provider.get_person(&id).await })
            .await
    }

    /// Per-cache entry counts.
    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            (self.movies.name(), self.movies.stats()),
            (self.movies_by_title.name(), self.movies_by_title.stats()),
            (self.shows.name(), self.shows.stats()),
            (self.shows_by_title.name(), self.shows_by_title.stats()),
            (self.people.name(), self.people.stats()),
        ]
    }

    /// Drop expired failure entries.
    pub fn purge_expired(&self) {
        self.movies.purge_expired();
        self.movies_by_title.purge_expired();
        self.shows.purge_expired();
        self.shows_by_title.purge_expired();
        self.people.purge_expired();
    }

    /// Write every cache into `doc`.
    pub fn dump_into(&self, doc: &mut SnapshotDocument) -> Result<()> {
        self.movies.dump_into(doc)?;
        self.movies_by_title.dump_into(doc)?;
        self.shows.dump_into(doc)?;
        self.shows_by_title.dump_into(doc)?;
        self.people.dump_into(doc)
    }

    /// Restore every cache present in `doc`.
    pub fn restore_from(&self, doc: &SnapshotDocument, report: &mut RestoreReport) {
        self.movies.restore_from(doc, report);
        self.movies_by_title.restore_from(doc, report);
        self.shows.restore_from(doc, report);
        self.shows_by_title.restore_from(doc, report);
        self.people.restore_from(doc, report);
    }

    fn index_movie(&self, item: &MediaItem, movie: &Movie) {
        self.add_movie_by_id(movie);
        self.movies_by_title
            .add(MovieTitleKey::new(item, movie.imdb_id.as_deref()), movie.clone());
    }

    fn add_movie_by_id(&self, movie: &Movie) {
        if !movie.id.is_empty() {
            self.movies.add(movie.id.clone(), movie.clone());
        }
    }

    fn index_show(&self, item: &MediaItem, show: &Show) {
        self.add_show_by_id(item, show);
        self.shows_by_title
            .add(ShowTitleKey::new(item, &show.show_ids), show.clone());
    }

    fn add_show_by_id(&self, item: &MediaItem, show: &Show) {
        if !show.id.is_empty() {
            self.shows.add(ShowEpisodeKey::new(&show.id, item), show.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marquee_common::ExternalIds;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        movie: Option<Movie>,
        show: Option<Show>,
        get_movie: AtomicU32,
        search_movie: AtomicU32,
        get_show: AtomicU32,
        search_show: AtomicU32,
    }

    #[async_trait]
    impl MovieShowProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn get_movie(&self, _id: &str) -> anyhow::Result<Option<Movie>> {
            self.get_movie.fetch_add(1, Ordering::SeqCst);
            Ok(self.movie.clone())
        }

        async fn search_movie(
            &self,
            _title: &str,
            _year: Option<u16>,
            _known: &ExternalIds,
        ) -> anyhow::Result<Option<Movie>> {
            self.search_movie.fetch_add(1, Ordering::SeqCst);
            Ok(self.movie.clone())
        }

        async fn get_show(
            &self,
            _id: &str,
            _season: Option<u32>,
            _episode: Option<u32>,
        ) -> anyhow::Result<Option<Show>> {
            self.get_show.fetch_add(1, Ordering::SeqCst);
            Ok(self.show.clone())
        }

        async fn search_show(
            &self,
            _show: &str,
            _year: Option<u16>,
            _known: &ExternalIds,
            _season: Option<u32>,
            _episode: Option<u32>,
        ) -> anyhow::Result<Option<Show>> {
            self.search_show.fetch_add(1, Ordering::SeqCst);
            Ok(self.show.clone())
        }

        async fn get_person(&self, _id: &str) -> anyhow::Result<Option<Person>> {
            Ok(None)
        }
    }

    fn matrix() -> Movie {
        Movie {
            id: "603".into(),
            title: "The Matrix".into(),
            imdb_id: Some("tt0133093".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn movie_by_id_is_also_indexed_by_title() {
        let provider = Arc::new(CountingProvider {
            movie: Some(matrix()),
            ..Default::default()
        });
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());

        let mut item = MediaItem::movie("The Matrix", 1999);
        item.external_ids.tmdb = Some("603".into());
        assert_eq!(cache.get_movie(&item).await, Some(matrix()));

        // Same item, now only known by imdb id: served from the title index.
        let mut by_imdb = MediaItem::movie("The Matrix", 1999);
        by_imdb.external_ids.imdb = Some("tt0133093".into());
        assert_eq!(cache.get_movie(&by_imdb).await, Some(matrix()));

        assert_eq!(provider.get_movie.load(Ordering::SeqCst), 1);
        assert_eq!(provider.search_movie.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_search_is_not_cached_but_indexes_result() {
        let provider = Arc::new(CountingProvider {
            movie: Some(matrix()),
            ..Default::default()
        });
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());
        let item = MediaItem::movie("The Matrix", 1999);

        cache.get_movie(&item).await;
        cache.get_movie(&item).await;
        assert_eq!(provider.search_movie.load(Ordering::SeqCst), 2);

        let mut by_id = item.clone();
        by_id.external_ids.tmdb = Some("603".into());
        cache.get_movie(&by_id).await;
        assert_eq!(provider.get_movie.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_title_key_search_is_remembered() {
        let provider = Arc::new(CountingProvider::default());
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());
        let mut item = MediaItem::movie("Unreleased", 2031);
        item.external_ids.imdb = Some("tt9999999".into());

        assert!(cache.get_movie(&item).await.is_none());
        assert!(cache.get_movie(&item).await.is_none());
        assert_eq!(provider.search_movie.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shows_are_cached_per_episode() {
        let provider = Arc::new(CountingProvider {
            show: Some(Show {
                id: "1396".into(),
                name: "Breaking Bad".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());

        let mut first = MediaItem::episode("Breaking Bad", 1, 1);
        first.external_ids.tmdb = Some("1396".into());
        let mut second = MediaItem::episode("Breaking Bad", 1, 2);
        second.external_ids.tmdb = Some("1396".into());

        cache.get_show(&first).await;
        cache.get_show(&first).await;
        cache.get_show(&second).await;

        assert_eq!(provider.get_show.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn show_with_tvdb_id_uses_title_key_cache() {
        let provider = Arc::new(CountingProvider {
            show: Some(Show {
                id: "1396".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());
        let mut item = MediaItem::episode("Breaking Bad", 1, 1);
        item.external_ids.tvdb = Some("81189".into());

        cache.get_show(&item).await;
        cache.get_show(&item).await;

        assert_eq!(provider.search_show.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats[2], (SHOWS_CACHE, CacheStats { hits: 1, misses: 0 }));
    }

    #[tokio::test]
    async fn snapshot_round_trip_across_all_caches() {
        let provider = Arc::new(CountingProvider {
            movie: Some(matrix()),
            ..Default::default()
        });
        let cache = TmdbCache::new(provider.clone(), FailurePolicy::default());
        cache.get_movie(&MediaItem::movie("The Matrix", 1999)).await;

        let mut doc = SnapshotDocument::new();
        cache.dump_into(&mut doc).unwrap();

        let restored = TmdbCache::new(provider, FailurePolicy::default());
        let mut report = RestoreReport::default();
        restored.restore_from(&doc, &mut report);

        assert_eq!(report.restored.get(MOVIES_CACHE), Some(&1));
        assert_eq!(report.restored.get(MOVIES_BY_TITLE_CACHE), Some(&1));
        assert!(report.failed.is_empty());
    }
}
