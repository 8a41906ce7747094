//! # Cache Module
//!
//! Multi-tier response cache sitting in front of the upstream metadata API.
//!
//! Every request is identified by an endpoint (e.g. `movie/popular`) and its
//! query parameters. The [`TieredCacheManager`] classifies the endpoint and
//! routes it to one of three tiers:
//!
//! - **base**: primary listings (popular, top rated, now playing...).
//!   The whole tier is dropped every `base_refresh_interval`.
//! - **flex**: every other cacheable endpoint. Bounded; when full, the
//!   oldest `flex_clear_amount` entries are evicted in one batch.
//! - **favorite**: entries promoted out of *flex* after
//!   `promotion_threshold` accesses. Dropped every `favorite_reset_interval`.
//!
//! Blacklisted endpoints (configuration, authentication...) are never cached.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cine_proxy::cache::{params, CacheConfig, TieredCacheManager};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let cache = TieredCacheManager::new(CacheConfig::default());
//!
//! let page = params([("page", 1)]);
//! let popular = cache
//!     .resolve("movie/popular", &page, || async {
//!         Ok::<_, std::io::Error>(json!({ "results": [] }))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod entry_store;
pub mod flex;
pub mod key;
pub mod tiered;

pub use entry_store::{EntryRecord, EntryStore};
pub use key::{cache_key, params, EndpointClass, Params};
pub use tiered::TieredCacheManager;

use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Endpoints served from the *base* tier.
pub const PRIMARY_ENDPOINTS: &[&str] = &[
    "movie/popular",
    "movie/top_rated",
    "movie/now_playing",
    "movie/upcoming",
    "tv/popular",
    "tv/top_rated",
    "tv/on_the_air",
    "tv/airing_today",
    "trending/all/day",
    "trending/all/week",
];

/// Endpoints that always go straight to the upstream API.
pub const BLACKLISTED_ENDPOINTS: &[&str] = &[
    "configuration",
    "configuration/languages",
    "configuration/countries",
    "authentication",
    "authentication/token/new",
    "health",
];

/// Tier policies and endpoint sets for the [`TieredCacheManager`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whole *base* tier is dropped after this long (default: 8 hours)
    pub base_refresh_interval: Duration,
    /// Whole *favorite* tier is dropped after this long (default: 24 hours)
    pub favorite_reset_interval: Duration,
    /// Maximum *flex* entries (default: 100)
    pub flex_capacity: usize,
    /// Entries evicted per batch when *flex* is full (default: 60)
    pub flex_clear_amount: usize,
    /// Accesses needed to move a *flex* entry to *favorite* (default: 7)
    pub promotion_threshold: u64,
    /// Endpoints cached in *base* (default: [`PRIMARY_ENDPOINTS`])
    pub primary_endpoints: HashSet<String>,
    /// Endpoints never cached (default: [`BLACKLISTED_ENDPOINTS`])
    pub blacklisted_endpoints: HashSet<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_refresh_interval: Duration::from_secs(8 * 60 * 60),
            favorite_reset_interval: Duration::from_secs(24 * 60 * 60),
            flex_capacity: 100,
            flex_clear_amount: 60,
            promotion_threshold: 7,
            primary_endpoints: PRIMARY_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            blacklisted_endpoints: BLACKLISTED_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Tier where a cached response currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    Base,
    Flex,
    Favorite,
}

/// Snapshot of cache counters and tier sizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    pub promotions: u64,
    pub evictions: u64,
    pub base_entries: usize,
    pub flex_entries: usize,
    pub favorite_entries: usize,
    pub hit_ratio: f64,
}
