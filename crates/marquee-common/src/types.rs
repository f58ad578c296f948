//! Core value types for playback items and their external identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

const IMDB_TITLE_URL: &str = "https://www.imdb.com/title/";
const TVDB_SERIES_URL: &str = "https://www.thetvdb.com/?tab=series&id=";

/// Kind of playback item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A single movie.
    Movie,
    /// A single episode of a TV show.
    Episode,
    /// Anything the media server reported that is neither (trailers, clips, music).
    #[default]
    Unknown,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Episode => write!(f, "episode"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which provider an id on a [`Role`](crate::Role) came from.
///
/// Provider A is series-oriented (TVDB-like), provider B is movie/show-oriented
/// (TMDB-like). Roles merged from a provider record that provider's person id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSlot {
    /// The series-oriented provider.
    Tvdb,
    /// The movie/show-oriented provider.
    Tmdb,
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tvdb => write!(f, "tvdb"),
            Self::Tmdb => write!(f, "tmdb"),
        }
    }
}

/// Three optional external identifiers.
///
/// Identity is structural. An empty string is treated exactly like `None`
/// because media servers and providers both emit `""` for unknown ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalIds {
    /// IMDB id, e.g. `tt0113277`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    /// TVDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<String>,
    /// TMDB id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
}

impl ExternalIds {
    /// Returns `true` when a non-empty imdb id is known.
    pub fn has_imdb(&self) -> bool {
        is_present(&self.imdb)
    }

    /// Returns `true` when a non-empty tvdb id is known.
    pub fn has_tvdb(&self) -> bool {
        is_present(&self.tvdb)
    }

    /// Returns `true` when a non-empty tmdb id is known.
    pub fn has_tmdb(&self) -> bool {
        is_present(&self.tmdb)
    }

    /// Known imdb id, with empty strings filtered out.
    pub fn imdb(&self) -> Option<&str> {
        present(&self.imdb)
    }

    /// Known tvdb id, with empty strings filtered out.
    pub fn tvdb(&self) -> Option<&str> {
        present(&self.tvdb)
    }

    /// Known tmdb id, with empty strings filtered out.
    pub fn tmdb(&self) -> Option<&str> {
        present(&self.tmdb)
    }

    /// Returns `true` when no id at all is known.
    pub fn is_empty(&self) -> bool {
        !self.has_imdb() && !self.has_tvdb() && !self.has_tmdb()
    }

    /// The id this set carries for `slot`.
    pub fn for_slot(&self, slot: ProviderSlot) -> Option<&str> {
        match slot {
            ProviderSlot::Tvdb => self.tvdb(),
            ProviderSlot::Tmdb => self.tmdb(),
        }
    }

    /// Mutable access to the field for `slot`.
    pub fn slot_mut(&mut self, slot: ProviderSlot) -> &mut Option<String> {
        match slot {
            ProviderSlot::Tvdb => &mut self.tvdb,
            ProviderSlot::Tmdb => &mut self.tmdb,
        }
    }

    /// Copy every id from `other` into fields that are currently empty.
    ///
    /// Returns the number of fields that were filled.
    pub fn fill_from(&mut self, other: &ExternalIds) -> usize {
        [
            fill_missing(&mut self.imdb, other.imdb()),
            fill_missing(&mut self.tvdb, other.tvdb()),
            fill_missing(&mut self.tmdb, other.tmdb()),
        ]
        .into_iter()
        .filter(|filled| *filled)
        .count()
    }

    /// IMDB title page for this id set, if an imdb id is known.
    pub fn imdb_title_url(&self) -> Option<String> {
        self.imdb().map(|id| format!("{IMDB_TITLE_URL}{id}"))
    }

    /// TVDB series page for this id set, if a tvdb id is known.
    pub fn tvdb_series_url(&self) -> Option<String> {
        self.tvdb().map(|id| format!("{TVDB_SERIES_URL}{id}"))
    }
}

/// Write `value` into `slot` only if `slot` is currently empty.
///
/// Empty incoming values are ignored. Returns `true` if the slot changed.
pub fn fill_missing(slot: &mut Option<String>, value: Option<&str>) -> bool {
    match value {
        Some(v) if !v.is_empty() && !is_present(slot) => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
