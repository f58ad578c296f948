//! Playback items and their cast.
//!
//! A [`MediaItem`] is created by the server-polling layer once per refresh
//! cycle and mutated in place by the enrichment pipeline. Its [`Role`] list is
//! owned exclusively by the item.

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::types::{fill_missing, ExternalIds, MediaKind};

const IMDB_AGENT_PREFIX: &str = "com.plexapp.agents.imdb://";
const TVDB_AGENT_PREFIX: &str = "com.plexapp.agents.thetvdb://";
const IMDB_NAME_URL: &str = "https://www.imdb.com/name/";

/// A movie or episode being enriched with external identifiers and cast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Identity of this item. Enrichment is serialized per id.
    pub id: ItemId,
    /// Movie, episode, or something enrichment ignores.
    pub kind: MediaKind,
    /// Movie title, or episode title for episodes.
    pub title: String,
    /// Release year (movies) or show premiere year (episodes).
    pub year: Option<u16>,
    /// Show name, for episodes.
    pub show: Option<String>,
    /// Season number, for episodes.
    pub season: Option<u32>,
    /// Episode number within the season, for episodes.
    pub episode: Option<u32>,
    /// Metadata-agent guid reported by the media server, if any.
    pub guid: Option<String>,
    /// Movie ids, or show-level ids for episodes.
    pub external_ids: ExternalIds,
    /// Episode-level ids. Unused for movies.
    pub episode_ids: ExternalIds,
    /// A pass against the series-oriented provider has completed.
    pub enriched_from_tvdb: bool,
    /// A pass against the movie/show-oriented provider has completed.
    pub enriched_from_tmdb: bool,
    /// Cast, in display order.
    pub roles: Vec<Role>,
}

impl MediaItem {
    /// Create an empty item of the given kind.
    pub fn new(kind: MediaKind, title: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Create a movie item.
    pub fn movie(title: impl Into<String>, year: u16) -> Self {
        Self {
            year: Some(year),
            ..Self::new(MediaKind::Movie, title)
        }
    }

    /// Create an episode item for `show` season `season`, episode `episode`.
    pub fn episode(show: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            show: Some(show.into()),
            season: Some(season),
            episode: Some(episode),
            ..Self::new(MediaKind::Episode, "")
        }
    }

    /// `(season, episode)` when both numbers are known.
    pub fn episode_number(&self) -> Option<(u32, u32)> {
        self.season.zip(self.episode)
    }

    /// Name used for title searches: the show for episodes, else the title.
    pub fn search_title(&self) -> &str {
        match self.kind {
            MediaKind::Episode => self.show.as_deref().unwrap_or(&self.title),
            _ => &self.title,
        }
    }

    /// Fill empty id fields from the metadata-agent guid.
    ///
    /// Recognises `com.plexapp.agents.imdb://tt0113277?lang=en` (imdb id) and
    /// `com.plexapp.agents.thetvdb://81189/1/3?lang=en` (show-level tvdb id).
    /// Returns the number of fields filled.
    pub fn derive_ids_from_guid(&mut self) -> usize {
        let Some(guid) = self.guid.as_deref() else {
            return 0;
        };

        let mut filled = 0;
        if let Some(imdb) = imdb_id_from_guid(guid) {
            filled += usize::from(fill_missing(&mut self.external_ids.imdb, Some(imdb)));
        }
        if let Some(tvdb) = tvdb_id_from_guid(guid) {
            filled += usize::from(fill_missing(&mut self.external_ids.tvdb, Some(tvdb)));
        }
        filled
    }

    /// Best external page for this item: IMDB if known, else TVDB.
    pub fn external_link(&self) -> Option<String> {
        self.external_ids
            .imdb_title_url()
            .or_else(|| self.external_ids.tvdb_series_url())
    }

    /// Next free role id: one past the current maximum, or 1.
    pub fn next_role_id(&self) -> u32 {
        self.roles.iter().map(|r| r.id).max().map_or(1, |max| max + 1)
    }
}

/// One cast entry: an actor playing a character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique within the owning item, assigned in increasing order.
    pub id: u32,
    /// Character name as credited.
    pub character: String,
    /// Actor / person name as credited.
    pub actor: String,
    /// Thumbnail reference (path or URL).
    pub thumb: Option<String>,
    /// Person-level ids, one per provider that credited this role.
    pub external_ids: ExternalIds,
}

impl Role {
    /// IMDB name page for the person, if an imdb id is known.
    pub fn imdb_name_url(&self) -> Option<String> {
        self.external_ids
            .imdb()
            .map(|id| format!("{IMDB_NAME_URL}{id}"))
    }
}

fn imdb_id_from_guid(guid: &str) -> Option<&str> {
    let rest = strip_prefix_ignore_case(guid, IMDB_AGENT_PREFIX)?;
    let id = rest.split('?').next().unwrap_or(rest);
    (!id.is_empty()).then_some(id)
}

fn tvdb_id_from_guid(guid: &str) -> Option<&str> {
    let rest = guid.strip_prefix(TVDB_AGENT_PREFIX)?;
    let id = rest.split(['/', '?']).next().unwrap_or(rest);
    (!id.is_empty()).then_some(id)
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_imdb_id_from_guid() {
        let mut item = MediaItem::movie("Heat", 1995);
        item.guid = Some("com.plexapp.agents.imdb://tt0113277?lang=en".into());
        assert_eq!(item.derive_ids_from_guid(), 1);
        assert_eq!(item.external_ids.imdb(), Some("tt0113277"));
    }

    #[test]
    fn imdb_prefix_is_case_insensitive() {
        let mut item = MediaItem::movie("Heat", 1995);
        item.guid = Some("COM.PLEXAPP.AGENTS.IMDB://tt0113277".into());
        item.derive_ids_from_guid();
        assert_eq!(item.external_ids.imdb(), Some("tt0113277"));
    }

    #[test]
    fn derives_show_tvdb_id_from_episode_guid() {
        let mut item = MediaItem::episode("Breaking Bad", 1, 3);
        item.guid = Some("com.plexapp.agents.thetvdb://81189/1/3?lang=en".into());
        assert_eq!(item.derive_ids_from_guid(), 1);
        assert_eq!(item.external_ids.tvdb(), Some("81189"));
        assert_eq!(item.external_ids.imdb(), None);
    }

    #[test]
    fn guid_derivation_never_overwrites() {
        let mut item = MediaItem::episode("Breaking Bad", 1, 3);
        item.external_ids.tvdb = Some("1".into());
        item.guid = Some("com.plexapp.agents.thetvdb://81189/1/3".into());
        assert_eq!(item.derive_ids_from_guid(), 0);
        assert_eq!(item.external_ids.tvdb(), Some("1"));
    }

    #[test]
    fn unknown_agents_are_ignored() {
        let mut item = MediaItem::movie("Home Video", 2020);
        item.guid = Some("local://1234".into());
        assert_eq!(item.derive_ids_from_guid(), 0);
        assert!(item.external_ids.is_empty());
    }

    #[test]
    fn next_role_id_starts_at_one() {
        let mut item = MediaItem::movie("Heat", 1995);
        assert_eq!(item.next_role_id(), 1);
        item.roles.push(Role {
            id: 7,
            ..Default::default()
        });
        assert_eq!(item.next_role_id(), 8);
    }

    #[test]
    fn external_link_prefers_imdb() {
        let mut item = MediaItem::episode("Breaking Bad", 1, 1);
        item.external_ids.tvdb = Some("81189".into());
        assert_eq!(
            item.external_link().as_deref(),
            Some("https://www.thetvdb.com/?tab=series&id=81189")
        );
        item.external_ids.imdb = Some("tt0903747".into());
        assert_eq!(
            item.external_link().as_deref(),
            Some("https://www.imdb.com/title/tt0903747")
        );
    }

    #[test]
    fn search_title_uses_show_for_episodes() {
        let mut item = MediaItem::episode("Breaking Bad", 1, 1);
        item.title = "Pilot".into();
        assert_eq!(item.search_title(), "Breaking Bad");
        assert_eq!(MediaItem::movie("Heat", 1995).search_title(), "Heat");
    }

    #[test]
    fn role_imdb_url() {
        let role = Role {
            external_ids: crate::ExternalIds {
                imdb: Some("nm0000199".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            role.imdb_name_url().as_deref(),
            Some("https://www.imdb.com/name/nm0000199")
        );
    }
}
