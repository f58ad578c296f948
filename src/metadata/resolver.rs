//! Identifier resolution: which provider lookups run for an item, in which
//! order, and how their results are merged into it.
//!
//! Movies consult the movie/show provider only. Episodes consult the series
//! provider, then the movie/show provider, then the series provider again if
//! the second lookup discovered the show's series id. Ids are only ever
//! written into empty fields.

use marquee_common::{fill_missing, Error, ItemId, MediaItem, MediaKind, ProviderSlot, Result, Role};
use serde::Serialize;
use tracing::{debug, info};

use super::roles::{merge_roles, IncomingRole, MergeSummary};
use super::tmdb_cache::TmdbCache;
use super::tvdb_cache::TvdbCache;

/// What one provider pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// The pass does not apply to this kind of item.
    #[default]
    NotRun,
    /// The pass needs an id the item does not have.
    Skipped,
    /// A previous pass already populated the item from this provider.
    AlreadyPopulated,
    /// The provider had nothing usable.
    NoData,
    /// The item was populated from this provider.
    Populated,
}

/// Summary of one enrichment pass over an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// The item the pass ran for.
    pub item_id: ItemId,
    /// Final outcome of the series-provider pass.
    pub tvdb: PassOutcome,
    /// Outcome of the movie/show-provider pass.
    pub tmdb: PassOutcome,
    /// Whether the series provider ran a second time because the movie/show
    /// provider discovered the series id.
    pub tvdb_retried: bool,
    /// Id fields filled on the item (show, episode and guid-derived).
    pub ids_filled: usize,
    /// Changes to the role list.
    pub roles: MergeSummary,
    /// Roles that gained an imdb id through person lookups.
    pub people_resolved: usize,
}

impl EnrichmentReport {
    /// An empty report for `item_id`.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            ..Default::default()
        }
    }

    /// Whether the pass changed the item.
    pub fn changed(&self) -> bool {
        self.ids_filled > 0 || !self.roles.is_empty() || self.people_resolved > 0
    }
}

/// Runs the lookup waterfalls for an item against both providers.
pub struct IdentifierResolver {
    tvdb: TvdbCache,
    tmdb: TmdbCache,
    resolve_cast_imdb_ids: bool,
}

impl IdentifierResolver {
    /// Create a resolver over both provider caches.
    pub fn new(tvdb: TvdbCache, tmdb: TmdbCache) -> Self {
        Self {
            tvdb,
            tmdb,
            resolve_cast_imdb_ids: true,
        }
    }

    /// Enable or disable the person lookups that fill roles' imdb ids.
    pub fn with_cast_imdb_ids(mut self, enabled: bool) -> Self {
        self.resolve_cast_imdb_ids = enabled;
        self
    }

    /// The series-provider cache.
    pub fn tvdb(&self) -> &TvdbCache {
        &self.tvdb
    }

    /// The movie/show-provider cache.
    pub fn tmdb(&self) -> &TmdbCache {
        &self.tmdb
    }

    /// Run one enrichment pass over `item`.
    ///
    /// Provider failures never surface here; they leave the item as it was. With
    /// `force`, providers that already populated the item are consulted again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an item that cannot be looked up at
    /// all: a forced pass over an item of unknown kind, or an item with neither
    /// a title nor any known id.
    pub async fn resolve(&self, item: &mut MediaItem, force: bool) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport::new(item.id);
        report.ids_filled += item.derive_ids_from_guid();

        if item.kind != MediaKind::Unknown
            && item.search_title().is_empty()
            && item.external_ids.is_empty()
        {
            return Err(Error::invalid_input(format!(
                "item {} has no title and no external ids",
                item.id
            )));
        }

        match item.kind {
            MediaKind::Movie => {
                let tmdb = self.populate_from_tmdb(item, force, &mut report).await;
                report.tmdb = tmdb;
            }
            MediaKind::Episode => {
                let had_tvdb = item.external_ids.has_tvdb();
                let tvdb = self.populate_from_tvdb(item, force, &mut report).await;
                let tmdb = self.populate_from_tmdb(item, force, &mut report).await;
                report.tvdb = tvdb;
                report.tmdb = tmdb;

                if !had_tvdb && item.external_ids.has_tvdb() {
                    debug!(item_id = %item.id, "Series id discovered; retrying series provider");
                    let retried = self.populate_from_tvdb(item, force, &mut report).await;
                    report.tvdb_retried = true;
                    report.tvdb = retried;
                }
            }
            MediaKind::Unknown if force => {
                return Err(Error::invalid_input(format!(
                    "item {} has unknown kind and cannot be enriched",
                    item.id
                )));
            }
            MediaKind::Unknown => {
                debug!(item_id = %item.id, "Skipping item of unknown kind");
                return Ok(report);
            }
        }

        if self.resolve_cast_imdb_ids {
            report.people_resolved = self.backfill_roles(&mut item.roles).await;
        }

        info!(
            item_id = %item.id,
            kind = %item.kind,
            tvdb = ?report.tvdb,
            tmdb = ?report.tmdb,
            tvdb_retried = report.tvdb_retried,
            ids_filled = report.ids_filled,
            roles_added = report.roles.added,
            roles_updated = report.roles.updated,
            "Enrichment pass finished"
        );
        Ok(report)
    }

    /// Fill `role`'s imdb id from its movie/show-provider person record.
    ///
    /// Returns `true` if the role changed.
    pub async fn resolve_role(&self, role: &mut Role) -> bool {
        if role.external_ids.has_imdb() {
            return false;
        }
        let Some(person_id) = role.external_ids.tmdb().map(str::to_string) else {
            return false;
        };

        match self.tmdb.get_person(&person_id).await {
            Some(person) => fill_missing(&mut role.external_ids.imdb, person.imdb_id.as_deref()),
            None => false,
        }
    }

    /// [`resolve_role`](Self::resolve_role) for every role. Returns the number
    /// of roles that changed.
    pub async fn backfill_roles(&self, roles: &mut [Role]) -> usize {
        let mut resolved = 0;
        for role in roles.iter_mut() {
            if self.resolve_role(role).await {
                resolved += 1;
            }
        }
        resolved
    }

    async fn populate_from_tvdb(
        &self,
        item: &mut MediaItem,
        force: bool,
        report: &mut EnrichmentReport,
    ) -> PassOutcome {
        if item.enriched_from_tvdb && !force {
            return PassOutcome::AlreadyPopulated;
        }
        let Some(series_id) = item.external_ids.tvdb().map(str::to_string) else {
            debug!(item_id = %item.id, "No series id; skipping series provider");
            return PassOutcome::Skipped;
        };

        let Some(series) = self
            .tvdb
            .get_series(&series_id, item.season, item.episode)
            .await
        else {
            return PassOutcome::NoData;
        };

        report.ids_filled += usize::from(fill_missing(
            &mut item.external_ids.imdb,
            series.imdb_id.as_deref(),
        ));

        let Some(episode) = item
            .episode_number()
            .and_then(|(season, episode)| series.episode(season, episode))
        else {
            debug!(item_id = %item.id, series_id = %series_id, "Episode not listed by series provider");
            return PassOutcome::NoData;
        };

        report.ids_filled += [
            fill_missing(&mut item.episode_ids.imdb, episode.imdb_id.as_deref()),
            fill_missing(&mut item.episode_ids.tvdb, Some(episode.id.as_str())),
        ]
        .into_iter()
        .filter(|filled| *filled)
        .count();

        let merged = merge_roles(
            &mut item.roles,
            series.actors.iter().map(IncomingRole::from),
            ProviderSlot::Tvdb,
        );
        report.roles.absorb(merged);

        item.enriched_from_tvdb = true;
        PassOutcome::Populated
    }

    async fn populate_from_tmdb(
        &self,
        item: &mut MediaItem,
        force: bool,
        report: &mut EnrichmentReport,
    ) -> PassOutcome {
        if item.enriched_from_tmdb && !force {
            return PassOutcome::AlreadyPopulated;
        }

        match item.kind {
            MediaKind::Movie => {
                let Some(movie) = self.tmdb.get_movie(item).await else {
                    return PassOutcome::NoData;
                };

                report.ids_filled += item.external_ids.fill_from(&movie.external_ids());
                let merged = merge_roles(
                    &mut item.roles,
                    movie.cast.iter().map(IncomingRole::from),
                    ProviderSlot::Tmdb,
                );
                report.roles.absorb(merged);
            }
            MediaKind::Episode => {
                let Some(show) = self.tmdb.get_show(item).await else {
                    return PassOutcome::NoData;
                };

                report.ids_filled += item.episode_ids.fill_from(&show.episode_ids);
                report.ids_filled += item.external_ids.fill_from(&show.show_ids);
                report.ids_filled +=
                    usize::from(fill_missing(&mut item.external_ids.tmdb, Some(show.id.as_str())));
                let merged = merge_roles(
                    &mut item.roles,
                    show.credits().map(IncomingRole::from),
                    ProviderSlot::Tmdb,
                );
                report.roles.absorb(merged);
            }
            MediaKind::Unknown => return PassOutcome::NotRun,
        }

        item.enriched_from_tmdb = true;
        PassOutcome::Populated
    }
}
