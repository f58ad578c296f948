//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external API and implements one of the
//! provider traits in [`provider`](super::provider).

pub mod tmdb;

pub use tmdb::TmdbProvider;

use async_trait::async_trait;
use marquee_common::ExternalIds;

use super::provider::{Movie, MovieShowProvider, Person, Series, SeriesProvider, Show};

/// Provider used when a source is not configured. Every lookup is "not found".
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl SeriesProvider for Disabled {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get_series(
        &self,
        _id: &str,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Series>> {
        Ok(None)
    }
}

#[async_trait]
impl MovieShowProvider for Disabled {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get_movie(&self, _id: &str) -> anyhow::Result<Option<Movie>> {
        Ok(None)
    }

    async fn search_movie(
        &self,
        _title: &str,
        _year: Option<u16>,
        _known: &ExternalIds,
    ) -> anyhow::Result<Option<Movie>> {
        Ok(None)
    }

    async fn get_show(
        &self,
        _id: &str,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        Ok(None)
    }

    async fn search_show(
        &self,
        _show: &str,
        _year: Option<u16>,
        _known: &ExternalIds,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        Ok(None)
    }

    async fn get_person(&self, _id: &str) -> anyhow::Result<Option<Person>> {
        Ok(None)
    }
}
