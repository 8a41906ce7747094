use crate::cache::CacheConfig;
use crate::upstream::tmdb::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Upstream
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_language: Option<String>,
    pub upstream_timeout: Duration,

    // Caché
    pub base_refresh_interval: Duration,
    pub favorite_reset_interval: Duration,
    pub flex_capacity: usize,
    pub flex_clear_amount: usize,
    pub promotion_threshold: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            // Upstream
            tmdb_api_key: std::env::var("TMDB_API_KEY").context("TMDB_API_KEY is not set")?,
            tmdb_base_url: std::env::var("TMDB_BASE_URL").unwrap_or(defaults.tmdb_base_url),
            tmdb_language: std::env::var("TMDB_LANGUAGE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            upstream_timeout: duration_var("UPSTREAM_TIMEOUT", defaults.upstream_timeout)?,

            // Caché
            base_refresh_interval: duration_var(
                "BASE_REFRESH_INTERVAL",
                defaults.base_refresh_interval,
            )?,
            favorite_reset_interval: duration_var(
                "FAVORITE_RESET_INTERVAL",
                defaults.favorite_reset_interval,
            )?,
            flex_capacity: parse_var("FLEX_CAPACITY", defaults.flex_capacity)?,
            flex_clear_amount: parse_var("FLEX_CLEAR_AMOUNT", defaults.flex_clear_amount)?,
            promotion_threshold: parse_var("PROMOTION_THRESHOLD", defaults.promotion_threshold)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The upstream base URL must parse
    /// - Flex capacity and clear amount must be > 0, and the clear amount
    ///   cannot exceed the capacity
    /// - Promotion threshold must be > 0
    /// - Refresh/reset intervals and the upstream timeout must be non-zero
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.tmdb_base_url)
            .with_context(|| format!("Invalid TMDB_BASE_URL: {}", self.tmdb_base_url))?;

        if self.flex_capacity == 0 {
            anyhow::bail!("Flex capacity must be greater than 0");
        }

        if self.flex_clear_amount == 0 || self.flex_clear_amount > self.flex_capacity {
            anyhow::bail!(
                "Flex clear amount must be between 1 and {}, got: {}",
                self.flex_capacity,
                self.flex_clear_amount
            );
        }

        if self.promotion_threshold == 0 {
            anyhow::bail!("Promotion threshold must be greater than 0");
        }

        if self.base_refresh_interval.is_zero() || self.favorite_reset_interval.is_zero() {
            anyhow::bail!("Cache refresh intervals must be greater than 0");
        }

        if self.upstream_timeout.is_zero() {
            anyhow::bail!("Upstream timeout must be greater than 0");
        }

        Ok(())
    }

    /// Tier policies for the cache; endpoint sets come from the static lists.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            base_refresh_interval: self.base_refresh_interval,
            favorite_reset_interval: self.favorite_reset_interval,
            flex_capacity: self.flex_capacity,
            flex_clear_amount: self.flex_clear_amount,
            promotion_threshold: self.promotion_threshold,
            ..CacheConfig::default()
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The API key is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Upstream: {} (lang: {}, timeout {})\n  \
            Cache: base every {}, favorite every {}\n  \
            Flex: {} entries, evict {} at a time, promote at {} hits",
            self.tmdb_base_url,
            self.tmdb_language.as_deref().unwrap_or("default"),
            humantime::format_duration(self.upstream_timeout),
            humantime::format_duration(self.base_refresh_interval),
            humantime::format_duration(self.favorite_reset_interval),
            self.flex_capacity,
            self.flex_clear_amount,
            self.promotion_threshold,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            // Upstream (la API key no tiene default)
            tmdb_api_key: String::new(),
            tmdb_base_url: DEFAULT_BASE_URL.to_string(),
            tmdb_language: None,
            upstream_timeout: Duration::from_secs(10),

            // Caché
            base_refresh_interval: cache.base_refresh_interval,
            favorite_reset_interval: cache.favorite_reset_interval,
            flex_capacity: cache.flex_capacity,
            flex_clear_amount: cache.flex_clear_amount,
            promotion_threshold: cache.promotion_threshold,
        }
    }
}

/// Lee un valor numérico; sin variable (o vacía) usa el default.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("Invalid value in {name}: {val}")),
        _ => Ok(default),
    }
}

/// Lee una duración en formato humantime (`90s`, `8h`, `1day`).
fn duration_var(name: &str, default: Duration) -> Result<Duration> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())
            .with_context(|| format!("Invalid duration in {name}: {val}")),
        _ => Ok(default),
    }
}
