//! Cache entries and the failure-expiry policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default lifetime of a failure entry: thirty minutes.
pub const DEFAULT_FAILURE_TTL_SECS: u64 = 30 * 60;

/// Why a lookup produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// The provider answered and had nothing for this key.
    NotFound,
    /// The provider could not be reached or returned an error.
    Unavailable,
}

/// A single cached outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry<V> {
    /// A successful lookup. Never replaced by a later failure.
    Hit(V),
    /// A failed lookup, retried once the policy TTL for `reason` elapses.
    Miss {
        /// When the lookup failed.
        failed_at: DateTime<Utc>,
        /// What kind of failure it was.
        reason: MissReason,
    },
}

impl<V> CacheEntry<V> {
    /// Returns `true` for [`CacheEntry::Hit`].
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The cached value, if this is a hit.
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss { .. } => None,
        }
    }
}

/// How long failure entries suppress new lookups.
///
/// "Not found" and "unavailable" have separate TTLs; both default to
/// [`DEFAULT_FAILURE_TTL_SECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// TTL for [`MissReason::NotFound`].
    pub not_found_ttl: Duration,
    /// TTL for [`MissReason::Unavailable`].
    pub unavailable_ttl: Duration,
}

impl FailurePolicy {
    /// Same TTL for every failure kind.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            not_found_ttl: ttl,
            unavailable_ttl: ttl,
        }
    }

    /// Build a policy from second counts, as found in configuration.
    pub fn from_secs(not_found_secs: u64, unavailable_secs: u64) -> Self {
        Self {
            not_found_ttl: secs(not_found_secs),
            unavailable_ttl: secs(unavailable_secs),
        }
    }

    /// TTL that applies to `reason`.
    pub fn ttl_for(&self, reason: MissReason) -> Duration {
        match reason {
            MissReason::NotFound => self.not_found_ttl,
            MissReason::Unavailable => self.unavailable_ttl,
        }
    }

    /// Whether a miss recorded at `failed_at` still suppresses lookups at `now`.
    pub fn is_fresh(&self, reason: MissReason, failed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - failed_at < self.ttl_for(reason)
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_FAILURE_TTL_SECS, DEFAULT_FAILURE_TTL_SECS)
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1_000_000))
}
