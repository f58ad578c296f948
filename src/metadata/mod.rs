//! Metadata enrichment for now-playing items.
//!
//! Two external sources feed an item: a series provider (TVDB-like, keyed by
//! series id) and a movie/show provider (TMDB-like, searchable by title).
//! Lookups against both go through [`ProviderCache`](crate::cache::ProviderCache)s
//! so each question is asked once, failures included.
//!
//! # Module layout
//!
//! - [`provider`] -- Provider traits and the records they return.
//! - [`providers`] -- Concrete provider implementations (TMDB).
//! - [`keys`] -- Composite cache keys.
//! - [`tvdb_cache`] / [`tmdb_cache`] -- Cached lookup waterfalls per source.
//! - [`roles`] -- Merging provider cast into an item's roles.
//! - [`resolver`] -- Per-item enrichment pass.
//! - [`enrichment`] -- Single-flight entry point and cache persistence.
//! - [`queue`] -- Background enrichment queue.

pub mod enrichment;
pub mod keys;
pub mod provider;
pub mod providers;
pub mod queue;
pub mod resolver;
pub mod roles;
pub mod tmdb_cache;
pub mod tvdb_cache;

pub use enrichment::{Enricher, SharedItem};
pub use provider::{Credit, Movie, MovieShowProvider, Person, Series, SeriesActor, SeriesEpisode, SeriesProvider, Show};
pub use queue::{EnrichmentEvent, EnrichmentJob, EnrichmentQueue};
pub use resolver::{EnrichmentReport, IdentifierResolver, PassOutcome};
pub use roles::{compare_name_words, find_match, merge_roles, IncomingRole, MergeSummary};
pub use tmdb_cache::TmdbCache;
pub use tvdb_cache::TvdbCache;
