//! Provider result caching.
//!
//! - [`ProviderCache`]: keyed memoization of provider lookups, including
//!   time-limited failure entries.
//! - [`SingleFlight`]: per-key deduplication of concurrent work.
//! - [`SnapshotDocument`]: persistence of several caches in one JSON file.

pub mod clock;
pub mod entry;
pub mod singleflight;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, FailurePolicy, MissReason, DEFAULT_FAILURE_TTL_SECS};
pub use singleflight::{Flight, Lease, SingleFlight};
pub use snapshot::{RestoreReport, SnapshotDocument};
pub use store::{CacheKey, CacheStats, CacheValue, ProviderCache};
