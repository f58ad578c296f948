//! Composite cache keys for lookups made before a provider id is known.
//!
//! Each key is a tuple struct, so it serializes as an ordered JSON array, for
//! example `["The Matrix",1999,"tt0133093"]`. That array is the key's snapshot
//! form.

use marquee_common::{Error, ExternalIds, MediaItem, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

macro_rules! json_array_key {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CacheKey for $ty {
                fn encode(&self) -> Result<String> {
                    Ok(serde_json::to_string(self)?)
                }

                fn decode(raw: &str) -> Result<Self> {
                    serde_json::from_str(raw)
                        .map_err(|e| Error::invalid_key(format!("{raw}: {e}")))
                }
            }
        )+
    };
}

/// `(title, year, imdb id)`: a movie found by title search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovieTitleKey(pub String, pub Option<u16>, pub Option<String>);

impl MovieTitleKey {
    /// Key for `item` with the given imdb id.
    pub fn new(item: &MediaItem, imdb: Option<&str>) -> Self {
        Self(item.title.clone(), item.year, non_empty(imdb))
    }
}

/// `(show id, season, episode)`: a show fetched by id for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShowEpisodeKey(pub String, pub Option<u32>, pub Option<u32>);

impl ShowEpisodeKey {
    /// Key for show `id` and the episode `item` refers to.
    pub fn new(id: &str, item: &MediaItem) -> Self {
        Self(id.to_string(), item.season, item.episode)
    }
}

/// `(show, year, imdb id, tvdb id, season, episode)`: a show found by title
/// search for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShowTitleKey(
    pub String,
    pub Option<u16>,
    pub Option<String>,
    pub Option<String>,
    pub Option<u32>,
    pub Option<u32>,
);

impl ShowTitleKey {
    /// Key for `item` with the given show-level ids.
    pub fn new(item: &MediaItem, ids: &ExternalIds) -> Self {
        Self(
            item.search_title().to_string(),
            item.year,
            ids.imdb().map(str::to_string),
            ids.tvdb().map(str::to_string),
            item.season,
            item.episode,
        )
    }
}

json_array_key!(MovieTitleKey, ShowEpisodeKey, ShowTitleKey);

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
