use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::{FailurePolicy, DEFAULT_FAILURE_TTL_SECS};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// How long a "not found" answer suppresses new lookups, in seconds
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_secs: u64,

    /// How long an unreachable provider suppresses new lookups, in seconds
    /// (default: same as `failure_ttl_secs`)
    #[serde(default)]
    pub unavailable_ttl_secs: Option<u64>,

    /// Where the provider cache snapshot is kept between runs
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_failure_ttl() -> u64 {
    DEFAULT_FAILURE_TTL_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            failure_ttl_secs: default_failure_ttl(),
            unavailable_ttl_secs: None,
            snapshot_path: None,
        }
    }
}

impl CacheConfig {
    /// Failure-entry expiry derived from the configured TTLs.
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::from_secs(
            self.failure_ttl_secs,
            self.unavailable_ttl_secs.unwrap_or(self.failure_ttl_secs),
        )
    }

    /// Snapshot path with `~` expanded.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path.as_ref().map(|path| {
            let raw = path.to_string_lossy();
            PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Look up people to fill in cast members' IMDB ids (default: true)
    #[serde(default = "default_true")]
    pub resolve_cast_imdb_ids: bool,

    /// Delay between background enrichment jobs, in milliseconds
    #[serde(default = "default_queue_rate_limit")]
    pub queue_rate_limit_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_queue_rate_limit() -> u64 {
    250
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            resolve_cast_imdb_ids: default_true(),
            queue_rate_limit_ms: default_queue_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB v3 API key. Lookups are disabled while empty.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_tmdb_base_url")]
    pub base_url: String,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: default_language(),
            base_url: default_tmdb_base_url(),
        }
    }
}

impl TmdbConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }
}
