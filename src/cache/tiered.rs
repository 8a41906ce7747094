use super::entry_store::{EntryRecord, EntryStore};
use super::flex::{FlexHit, FlexTier};
use super::key::{cache_key, classify, EndpointClass, Params};
use super::{CacheConfig, CacheStatistics, TierKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::{debug, info};

/// Tiers de endpoints no primarios. Viven bajo un mismo lock para que
/// una clave nunca esté a la vez en *flex* y en *favorite*.
#[derive(Debug)]
struct DefaultTiers {
    flex: FlexTier,
    favorite: HashMap<String, EntryRecord<Value>>,
    favorite_reset_at: Instant,
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    promotions: AtomicU64,
    evictions: AtomicU64,
}

/// Caché de tres tiers frente a la API de metadata.
///
/// Se construye una sola vez en la raíz de composición y se comparte
/// como `Arc<TieredCacheManager>`. Ningún lock se mantiene mientras se
/// espera al productor: dos misses concurrentes de la misma clave pueden
/// llamar ambos a la API y gana la última escritura.
#[derive(Debug)]
pub struct TieredCacheManager {
    config: CacheConfig,
    base: EntryStore<String, Value>,
    base_refreshed_at: Mutex<Instant>,
    tiers: Mutex<DefaultTiers>,
    stats: CacheStats,
}

impl TieredCacheManager {
    pub fn new(config: CacheConfig) -> Self {
        let now = Instant::now();
        let tiers = DefaultTiers {
            flex: FlexTier::new(config.flex_capacity, config.flex_clear_amount),
            favorite: HashMap::new(),
            favorite_reset_at: now,
        };

        info!(
            "🗄️ Caché por tiers iniciada: flex={} (bloques de {}), promoción a {} accesos, base cada {}, favorite cada {}",
            config.flex_capacity,
            config.flex_clear_amount,
            config.promotion_threshold,
            humantime::format_duration(config.base_refresh_interval),
            humantime::format_duration(config.favorite_reset_interval),
        );

        Self {
            config,
            base: EntryStore::new(),
            base_refreshed_at: Mutex::new(now),
            tiers: Mutex::new(tiers),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn classify(&self, endpoint: &str) -> EndpointClass {
        classify(
            endpoint,
            &self.config.primary_endpoints,
            &self.config.blacklisted_endpoints,
        )
    }

    /// Sirve `(endpoint, params)` desde caché o llama a `produce` y guarda
    /// el resultado en el tier que corresponda.
    ///
    /// Los errores de `produce` se propagan sin tocar y nunca se cachean.
    pub async fn resolve<F, Fut, E>(&self, endpoint: &str, params: &Params, produce: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let class = self.classify(endpoint);
        if class == EndpointClass::Blacklisted {
            self.stats.bypasses.fetch_add(1, Ordering::Relaxed);
            debug!("⏭️ Endpoint sin caché: {}", endpoint);
            return produce().await;
        }

        let key = cache_key(endpoint, params);
        self.expire_favorites();

        match class {
            EndpointClass::Primary => self.resolve_primary(key, produce).await,
            _ => self.resolve_default(key, produce).await,
        }
    }

    async fn resolve_primary<F, Fut, E>(&self, key: String, produce: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        self.expire_base();

        if let Some(value) = self.base.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!("✅ Cache hit (base): {}", key);
            return Ok(value);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!("❌ Cache miss (base): {}", key);

        let value = produce().await?;
        self.base.create(key, value.clone());
        Ok(value)
    }

    async fn resolve_default<F, Fut, E>(&self, key: String, produce: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.lookup_default(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!("❌ Cache miss (flex): {}", key);

        let value = produce().await?;
        self.store_default(key, value.clone());
        Ok(value)
    }

    /// Guarda una respuesta recién obtenida. Si mientras tanto otra petición
    /// la promovió a *favorite*, se actualiza ahí y no entra a *flex*.
    fn store_default(&self, key: String, value: Value) {
        let mut guard = self.tiers.lock();
        let tiers = &mut *guard;

        if let Some(record) = tiers.favorite.remove(&key) {
            debug!("⭐ Respuesta tardía actualiza favorite: {}", key);
            tiers.favorite.insert(key, record.with_value(value));
            return;
        }

        let evicted = tiers.flex.insert(key, value);
        self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Busca en *favorite* y luego en *flex*, contando el acceso y
    /// promoviendo la entrada si llega al umbral.
    fn lookup_default(&self, key: &str) -> Option<Value> {
        let mut guard = self.tiers.lock();
        let tiers = &mut *guard;

        if let Some(record) = tiers.favorite.get(key) {
            debug!("⭐ Cache hit (favorite): {}", key);
            return Some(record.value().clone());
        }

        match tiers.flex.hit(key, self.config.promotion_threshold)? {
            FlexHit::Retained { value, evicted } => {
                self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
                debug!("✅ Cache hit (flex): {}", key);
                Some(value)
            }
            FlexHit::Promoted(record) => {
                self.stats.promotions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "⭐ Promovida a favorite tras {} accesos: {}",
                    record.access_count(),
                    key
                );
                let value = record.value().clone();
                tiers.favorite.insert(key.to_string(), record.promoted());
                Some(value)
            }
        }
    }

    fn expire_favorites(&self) {
        let mut tiers = self.tiers.lock();
        if tiers.favorite_reset_at.elapsed() > self.config.favorite_reset_interval {
            let removed = tiers.favorite.len();
            tiers.favorite.clear();
            tiers.favorite_reset_at = Instant::now();
            info!("🔄 Tier favorite reiniciado ({} entradas)", removed);
        }
    }

    fn expire_base(&self) {
        let mut refreshed_at = self.base_refreshed_at.lock();
        if refreshed_at.elapsed() > self.config.base_refresh_interval {
            let removed = self.base.clear();
            *refreshed_at = Instant::now();
            info!("🔄 Tier base refrescado ({} entradas)", removed);
        }
    }

    /// Tier donde vive actualmente la respuesta de `(endpoint, params)`.
    pub fn tier_of(&self, endpoint: &str, params: &Params) -> Option<TierKind> {
        let key = cache_key(endpoint, params);
        if self.base.contains(&key) {
            return Some(TierKind::Base);
        }
        let tiers = self.tiers.lock();
        if tiers.favorite.contains_key(&key) {
            Some(TierKind::Favorite)
        } else if tiers.flex.contains(&key) {
            Some(TierKind::Flex)
        } else {
            None
        }
    }

    /// Contador de accesos de una entrada mientras reside en *flex*.
    pub fn flex_access_count(&self, endpoint: &str, params: &Params) -> Option<u64> {
        let key = cache_key(endpoint, params);
        self.tiers.lock().flex.access_count(&key)
    }

    /// Vacía los tres tiers y reinicia los temporizadores.
    pub fn clear(&self) {
        let now = Instant::now();
        let base_removed = self.base.clear();
        *self.base_refreshed_at.lock() = now;

        let mut tiers = self.tiers.lock();
        let flex_removed = tiers.flex.clear();
        let favorite_removed = tiers.favorite.len();
        tiers.favorite.clear();
        tiers.favorite_reset_at = now;

        info!(
            "🧹 Caché vaciada: base={}, flex={}, favorite={}",
            base_removed, flex_removed, favorite_removed
        );
    }

    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_ratio = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        let tiers = self.tiers.lock();
        CacheStatistics {
            hits,
            misses,
            bypasses: self.stats.bypasses.load(Ordering::Relaxed),
            promotions: self.stats.promotions.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            base_entries: self.base.len(),
            flex_entries: tiers.flex.len(),
            favorite_entries: tiers.favorite.len(),
            hit_ratio,
        }
    }
}

impl Default for TieredCacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::params;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug, PartialEq)]
    struct UpstreamDown;

    async fn fetch(
        cache: &TieredCacheManager,
        calls: &AtomicUsize,
        endpoint: &str,
        params: &Params,
    ) -> Value {
        cache
            .resolve(endpoint, params, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(json!({ "endpoint": endpoint, "fetch": n }))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_blacklisted_endpoint_bypasses_cache() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("page", 1)]);

        fetch(&cache, &calls, "configuration", &p).await;
        fetch(&cache, &calls, "configuration", &p).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.tier_of("configuration", &p), None);
        assert_eq!(cache.statistics().bypasses, 2);
    }

    #[tokio::test]
    async fn test_primary_endpoint_hits_base() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("page", 1)]);

        let first = fetch(&cache, &calls, "movie/popular", &p).await;
        let second = fetch(&cache, &calls, "movie/popular", &p).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.tier_of("movie/popular", &p), Some(TierKind::Base));
        assert_eq!(cache.flex_access_count("movie/popular", &p), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_refresh_after_interval() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("page", 1)]);

        fetch(&cache, &calls, "movie/popular", &p).await;
        tokio::time::advance(Duration::from_secs(7 * 60 * 60)).await;
        fetch(&cache, &calls, "movie/popular", &p).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60 * 60 + 1)).await;
        let refreshed = fetch(&cache, &calls, "movie/popular", &p).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed["fetch"], json!(1));
    }

    #[tokio::test]
    async fn test_flex_miss_then_hit() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("query", "alien")]);

        fetch(&cache, &calls, "search/movie", &p).await;
        assert_eq!(cache.flex_access_count("search/movie", &p), Some(1));

        fetch(&cache, &calls, "search/movie", &p).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.tier_of("search/movie", &p), Some(TierKind::Flex));
        assert_eq!(cache.flex_access_count("search/movie", &p), Some(2));
    }

    #[tokio::test]
    async fn test_promotion_to_favorite() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params::<_, &str, Value>([]);

        for _ in 0..6 {
            fetch(&cache, &calls, "movie/550", &p).await;
        }
        assert_eq!(cache.tier_of("movie/550", &p), Some(TierKind::Flex));
        assert_eq!(cache.flex_access_count("movie/550", &p), Some(6));

        // Séptimo acceso: alcanza el umbral
        fetch(&cache, &calls, "movie/550", &p).await;
        assert_eq!(cache.tier_of("movie/550", &p), Some(TierKind::Favorite));
        assert_eq!(cache.flex_access_count("movie/550", &p), None);

        for _ in 0..5 {
            fetch(&cache, &calls, "movie/550", &p).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.tier_of("movie/550", &p), Some(TierKind::Favorite));

        let stats = cache.statistics();
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.flex_entries, 0);
        assert_eq!(stats.favorite_entries, 1);
    }

    #[tokio::test]
    async fn test_flex_bulk_eviction() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);

        for id in 0..100 {
            fetch(&cache, &calls, "movie/details", &params([("id", id)])).await;
            assert!(cache.statistics().flex_entries <= 100);
        }
        assert_eq!(cache.statistics().flex_entries, 100);

        fetch(&cache, &calls, "movie/details", &params([("id", 100)])).await;
        let stats = cache.statistics();
        assert_eq!(stats.flex_entries, 41);
        assert_eq!(stats.evictions, 60);

        for id in 0..60 {
            assert_eq!(cache.tier_of("movie/details", &params([("id", id)])), None);
        }
        assert_eq!(
            cache.tier_of("movie/details", &params([("id", 60)])),
            Some(TierKind::Flex)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorite_reset_after_interval() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("id", 603)]);

        for _ in 0..7 {
            fetch(&cache, &calls, "movie/credits", &p).await;
        }
        assert_eq!(cache.tier_of("movie/credits", &p), Some(TierKind::Favorite));

        tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
        fetch(&cache, &calls, "movie/credits", &p).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.tier_of("movie/credits", &p), Some(TierKind::Flex));
        assert_eq!(cache.flex_access_count("movie/credits", &p), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorite_reset_runs_on_primary_requests() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("id", 1)]);

        for _ in 0..7 {
            fetch(&cache, &calls, "tv/1399", &p).await;
        }
        tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;
        fetch(&cache, &calls, "movie/popular", &p).await;

        assert_eq!(cache.statistics().favorite_entries, 0);
    }

    #[tokio::test]
    async fn test_param_order_shares_entry() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);

        let a = params([("query", json!("matrix")), ("page", json!(2))]);
        let b = params([("page", json!(2)), ("query", json!("matrix"))]);
        fetch(&cache, &calls, "search/movie", &a).await;
        fetch(&cache, &calls, "search/movie", &b).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.flex_access_count("search/movie", &a), Some(2));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = TieredCacheManager::default();
        let p = params([("page", 1)]);

        for endpoint in ["movie/popular", "search/tv", "configuration"] {
            let result = cache
                .resolve(endpoint, &p, || async { Err::<Value, _>(UpstreamDown) })
                .await;
            assert_eq!(result, Err(UpstreamDown));
            assert_eq!(cache.tier_of(endpoint, &p), None);
        }

        let stats = cache.statistics();
        assert_eq!(stats.base_entries, 0);
        assert_eq!(stats.flex_entries, 0);
        assert_eq!(stats.favorite_entries, 0);

        // Tras el fallo, la siguiente llamada vuelve a la API
        let calls = AtomicUsize::new(0);
        fetch(&cache, &calls, "search/tv", &p).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_state() {
        let cache = Arc::new(TieredCacheManager::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20).map(|id| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                let p = params([("id", id)]);
                cache
                    .resolve("person/details", &p, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, Infallible>(json!(id))
                    })
                    .await
            })
        });

        let results = futures::future::join_all(tasks).await;
        assert!(results.into_iter().all(|r| matches!(r, Ok(Ok(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(cache.statistics().flex_entries, 20);
    }

    #[tokio::test]
    async fn test_late_miss_keeps_key_out_of_flex_once_promoted() {
        let cache = Arc::new(TieredCacheManager::default());
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let p = params([("id", 27205)]);
                cache
                    .resolve("movie/details", &p, move || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, Infallible>(json!("slow"))
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        // Mientras la primera petición espera, otra la trae y la promueve
        let calls = AtomicUsize::new(0);
        let p = params([("id", 27205)]);
        for _ in 0..7 {
            fetch(&cache, &calls, "movie/details", &p).await;
        }
        assert_eq!(cache.tier_of("movie/details", &p), Some(TierKind::Favorite));

        release_tx.send(()).unwrap();
        assert_eq!(slow.await.unwrap().unwrap(), json!("slow"));

        assert_eq!(cache.tier_of("movie/details", &p), Some(TierKind::Favorite));
        assert_eq!(cache.flex_access_count("movie/details", &p), None);
        assert_eq!(cache.statistics().flex_entries, 0);
        // Gana la última escritura
        assert_eq!(fetch(&cache, &calls, "movie/details", &p).await, json!("slow"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_touch_at_full_flex_counts_evictions() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);

        for id in 0..100 {
            fetch(&cache, &calls, "tv/details", &params([("id", id)])).await;
        }
        fetch(&cache, &calls, "tv/details", &params([("id", 50)])).await;

        let stats = cache.statistics();
        assert_eq!(stats.flex_entries, 41);
        assert_eq!(stats.evictions, 59);
        assert_eq!(calls.load(Ordering::SeqCst), 100);
        assert_eq!(
            cache.flex_access_count("tv/details", &params([("id", 50)])),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_clear_empties_every_tier() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("page", 1)]);

        fetch(&cache, &calls, "movie/popular", &p).await;
        fetch(&cache, &calls, "search/movie", &p).await;
        cache.clear();

        let stats = cache.statistics();
        assert_eq!((stats.base_entries, stats.flex_entries), (0, 0));
        assert_eq!(stats.hit_ratio, 0.0);
    }

    #[tokio::test]
    async fn test_statistics_serialize_for_logs() {
        let cache = TieredCacheManager::default();
        let calls = AtomicUsize::new(0);
        let p = params([("page", 1)]);

        fetch(&cache, &calls, "movie/popular", &p).await;
        fetch(&cache, &calls, "movie/popular", &p).await;

        let logged = serde_json::to_value(cache.statistics()).unwrap();
        assert_eq!(logged["hits"], json!(1));
        assert_eq!(logged["misses"], json!(1));
        assert_eq!(logged["base_entries"], json!(1));
        assert_eq!(logged["hit_ratio"], json!(0.5));
    }
}
