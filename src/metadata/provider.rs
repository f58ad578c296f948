//! Provider traits and the result shapes they return.
//!
//! Two kinds of provider feed enrichment:
//!
//! - [`SeriesProvider`]: series-oriented (TheTVDB-like). One call returns a
//!   series with its episodes and its regular cast.
//! - [`MovieShowProvider`]: movie/show-oriented (TMDB-like). Separate calls for
//!   movies, show episodes and people, plus title searches.
//!
//! Every lookup returns `anyhow::Result<Option<T>>`: `Ok(None)` means the
//! provider answered and has nothing, `Err(_)` means it could not be asked.

use async_trait::async_trait;
use marquee_common::ExternalIds;
use serde::{Deserialize, Serialize};

use crate::cache::CacheValue;

// ---------------------------------------------------------------------------
// Series provider results
// ---------------------------------------------------------------------------

/// A series as returned by the series provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Provider id of the series.
    pub id: String,
    /// Series name.
    pub name: String,
    /// Show-level IMDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Known episodes. May be partial: a series fetched for one episode is not
    /// guaranteed to list episodes aired later.
    #[serde(default)]
    pub episodes: Vec<SeriesEpisode>,
    /// Regular cast.
    #[serde(default)]
    pub actors: Vec<SeriesActor>,
}

impl Series {
    /// Find the episode record for `season` / `episode`.
    pub fn episode(&self, season: u32, episode: u32) -> Option<&SeriesEpisode> {
        self.episodes
            .iter()
            .find(|e| e.season == season && e.episode == episode)
    }

    /// Whether this series can answer a lookup for the given episode.
    ///
    /// A lookup without episode numbers is satisfied by any series.
    pub fn covers(&self, season: Option<u32>, episode: Option<u32>) -> bool {
        match season.zip(episode) {
            Some((s, e)) => self.episode(s, e).is_some(),
            None => true,
        }
    }
}

impl CacheValue for Series {
    const SCHEMA_VERSION: u32 = 2;
}

/// One episode of a [`Series`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesEpisode {
    /// Provider id of the episode.
    pub id: String,
    /// Season number.
    pub season: u32,
    /// Episode number within the season.
    pub episode: u32,
    /// Episode title.
    #[serde(default)]
    pub name: String,
    /// Episode-level IMDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
}

/// A cast member of a [`Series`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesActor {
    /// Provider id of the actor entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Character played.
    pub role: String,
    /// Actor name.
    pub name: String,
    /// Full image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Movie / show provider results
// ---------------------------------------------------------------------------

/// One credit line: a person playing a character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    /// Character played.
    pub character: String,
    /// Person name.
    pub name: String,
    /// Full profile image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
    /// Provider id of the person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

/// A movie as returned by the movie/show provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    /// Provider id of the movie.
    pub id: String,
    /// Movie title.
    pub title: String,
    /// Release date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// IMDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Cast list.
    #[serde(default)]
    pub cast: Vec<Credit>,
}

impl Movie {
    /// The movie's ids in [`ExternalIds`] form.
    pub fn external_ids(&self) -> ExternalIds {
        ExternalIds {
            imdb: self.imdb_id.clone(),
            tvdb: None,
            tmdb: Some(self.id.clone()),
        }
    }
}

impl CacheValue for Movie {
    const SCHEMA_VERSION: u32 = 1;
}

/// A show, resolved for one specific episode.
///
/// Show-level and episode-level ids come from separate external-id documents
/// and are kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Show {
    /// Provider id of the show.
    pub id: String,
    /// Show name.
    pub name: String,
    /// First air date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    /// Season the episode data belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    /// Episode the episode data belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Show-level ids.
    #[serde(default)]
    pub show_ids: ExternalIds,
    /// Episode-level ids.
    #[serde(default)]
    pub episode_ids: ExternalIds,
    /// Episode cast.
    #[serde(default)]
    pub cast: Vec<Credit>,
    /// Episode guest stars.
    #[serde(default)]
    pub guest_stars: Vec<Credit>,
}

impl Show {
    /// Regular cast followed by guest stars.
    pub fn credits(&self) -> impl Iterator<Item = &Credit> {
        self.cast.iter().chain(self.guest_stars.iter())
    }
}

impl CacheValue for Show {
    const SCHEMA_VERSION: u32 = 1;
}

/// A person as returned by the movie/show provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Provider id of the person.
    pub id: String,
    /// Person name.
    pub name: String,
    /// IMDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
}

impl CacheValue for Person {
    const SCHEMA_VERSION: u32 = 1;
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// Series-oriented metadata provider.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tvdb"`).
    fn name(&self) -> &'static str;

    /// Fetch the series `id`. `season` / `episode` name the episode the caller
    /// is interested in, so implementations can make sure it is included.
    async fn get_series(
        &self,
        id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> anyhow::Result<Option<Series>>;
}

/// Movie/show-oriented metadata provider.
#[async_trait]
pub trait MovieShowProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn name(&self) -> &'static str;

    /// Fetch a movie by provider id.
    async fn get_movie(&self, id: &str) -> anyhow::Result<Option<Movie>>;

    /// Search for a movie by title and year. `known` carries ids already known
    /// for the item, used to pick between candidates.
    async fn search_movie(
        &self,
        title: &str,
        year: Option<u16>,
        known: &ExternalIds,
    ) -> anyhow::Result<Option<Movie>>;

    /// Fetch a show by provider id, with episode data for `season` / `episode`.
    async fn get_show(
        &self,
        id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>>;

    /// Search for a show by name and year, with episode data for
    /// `season` / `episode`.
    async fn search_show(
        &self,
        show: &str,
        year: Option<u16>,
        known: &ExternalIds,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>>;

    /// Fetch a person by provider id.
    async fn get_person(&self, id: &str) -> anyhow::Result<Option<Person>>;
}
