//! Shared test fakes for integration tests.
//!
//! [`FakeSeries`] and [`FakeCatalog`] answer from in-memory tables, count every
//! call and can be switched to fail, so tests can assert exactly how often the
//! caches reach a provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marquee::cache::{FailurePolicy, ManualClock};
use marquee::metadata::{
    Enricher, IdentifierResolver, Movie, MovieShowProvider, Person, Series, SeriesProvider, Show,
    TmdbCache, TvdbCache,
};
use marquee_common::ExternalIds;
use parking_lot::Mutex;

/// Series provider backed by a table of series keyed by id.
#[derive(Default)]
pub struct FakeSeries {
    series: Mutex<HashMap<String, Series>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicU32,
}

impl FakeSeries {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, series: Series) {
        self.series.lock().insert(series.id.clone(), series);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeriesProvider for FakeSeries {
    fn name(&self) -> &'static str {
        "fake-series"
    }

    async fn get_series(
        &self,
        id: &str,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Series>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("series provider unreachable");
        }
        Ok(self.series.lock().get(id).cloned())
    }
}

/// Movie/show provider backed by tables keyed by id and by title.
#[derive(Default)]
pub struct FakeCatalog {
    movies: Mutex<HashMap<String, Movie>>,
    shows: Mutex<HashMap<String, Show>>,
    people: Mutex<HashMap<String, Person>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub movie_gets: AtomicU32,
    pub movie_searches: AtomicU32,
    pub show_gets: AtomicU32,
    pub show_searches: AtomicU32,
    pub person_gets: AtomicU32,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `movie`; it is found by id and by exact title.
    pub fn insert_movie(&self, movie: Movie) {
        self.movies.lock().insert(movie.id.clone(), movie);
    }

    /// Register `show`; it is found by id and by exact name.
    pub fn insert_show(&self, show: Show) {
        self.shows.lock().insert(show.id.clone(), show);
    }

    pub fn insert_person(&self, person: Person) {
        self.people.lock().insert(person.id.clone(), person);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn total_calls(&self) -> u32 {
        [
            &self.movie_gets,
            &self.movie_searches,
            &self.show_gets,
            &self.show_searches,
            &self.person_gets,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    async fn answer(&self, counter: &AtomicU32) -> anyhow::Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("catalog unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl MovieShowProvider for FakeCatalog {
    fn name(&self) -> &'static str {
        "fake-catalog"
    }

    async fn get_movie(&self, id: &str) -> anyhow::Result<Option<Movie>> {
        self.answer(&self.movie_gets).await?;
        Ok(self.movies.lock().get(id).cloned())
    }

    async fn search_movie(
        &self,
        title: &str,
        _year: Option<u16>,
        _known: &ExternalIds,
    ) -> anyhow::Result<Option<Movie>> {
        self.answer(&self.movie_searches).await?;
        Ok(self.movies.lock().values().find(|m| m.title == title).cloned())
    }

    async fn get_show(
        &self,
        id: &str,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        self.answer(&self.show_gets).await?;
        Ok(self.shows.lock().get(id).cloned())
    }

    async fn search_show(
        &self,
        show: &str,
        _year: Option<u16>,
        _known: &ExternalIds,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        self.answer(&self.show_searches).await?;
        Ok(self.shows.lock().values().find(|s| s.name == show).cloned())
    }

    async fn get_person(&self, id: &str) -> anyhow::Result<Option<Person>> {
        self.answer(&self.person_gets).await?;
        Ok(self.people.lock().get(id).cloned())
    }
}

/// Enricher over the fakes with the system clock.
pub fn enricher(series: Arc<FakeSeries>, catalog: Arc<FakeCatalog>) -> Enricher {
    Enricher::new(IdentifierResolver::new(
        TvdbCache::new(series, FailurePolicy::default()),
        TmdbCache::new(catalog, FailurePolicy::default()),
    ))
}

/// Resolver over the fakes sharing one manual clock.
pub fn resolver_with_clock(
    series: Arc<FakeSeries>,
    catalog: Arc<FakeCatalog>,
    clock: Arc<ManualClock>,
) -> IdentifierResolver {
    IdentifierResolver::new(
        TvdbCache::with_clock(series, FailurePolicy::default(), clock.clone()),
        TmdbCache::with_clock(catalog, FailurePolicy::default(), clock),
    )
}
