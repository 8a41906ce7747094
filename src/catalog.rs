use crate::cache::{params, Params, TieredCacheManager};
use crate::error::UpstreamError;
use crate::upstream::MetadataSource;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Consultas de catálogo servidas a través de la caché por tiers.
///
/// Es lo que consumen los handlers HTTP: cada método arma el endpoint y
/// sus parámetros y delega en [`TieredCacheManager::resolve`].
#[derive(Clone)]
pub struct Catalog {
    cache: Arc<TieredCacheManager>,
    source: Arc<dyn MetadataSource>,
}

impl Catalog {
    pub fn new(cache: Arc<TieredCacheManager>, source: Arc<dyn MetadataSource>) -> Self {
        Self { cache, source }
    }

    pub fn cache(&self) -> &Arc<TieredCacheManager> {
        &self.cache
    }

    /// Consulta genérica `(endpoint, params)`.
    pub async fn get(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let source = &self.source;
        self.cache
            .resolve(endpoint, params, move || async move {
                source.fetch(endpoint, params).await.inspect_err(|e| {
                    warn!("⚠️ {} falló para {}: {}", source.source_name(), endpoint, e)
                })
            })
            .await
    }

    pub async fn popular_movies(&self, page: u32) -> Result<Value, UpstreamError> {
        self.get("movie/popular", &params([("page", page)])).await
    }

    pub async fn top_rated_movies(&self, page: u32) -> Result<Value, UpstreamError> {
        self.get("movie/top_rated", &params([("page", page)])).await
    }

    pub async fn popular_tv(&self, page: u32) -> Result<Value, UpstreamError> {
        self.get("tv/popular", &params([("page", page)])).await
    }

    pub async fn search_movies(&self, query: &str, page: u32) -> Result<Value, UpstreamError> {
        self.search("search/movie", query, page).await
    }

    pub async fn search_tv(&self, query: &str, page: u32) -> Result<Value, UpstreamError> {
        self.search("search/tv", query, page).await
    }

    pub async fn movie_details(&self, id: u64) -> Result<Value, UpstreamError> {
        self.get(&format!("movie/{id}"), &Params::new()).await
    }

    pub async fn tv_details(&self, id: u64) -> Result<Value, UpstreamError> {
        self.get(&format!("tv/{id}"), &Params::new()).await
    }

    pub async fn movie_credits(&self, id: u64) -> Result<Value, UpstreamError> {
        self.get(&format!("movie/{id}/credits"), &Params::new()).await
    }

    pub async fn genres_movie(&self) -> Result<Value, UpstreamError> {
        self.get("genre/movie/list", &Params::new()).await
    }

    async fn search(&self, endpoint: &str, query: &str, page: u32) -> Result<Value, UpstreamError> {
        let params = params([
            ("query", Value::from(query.trim())),
            ("page", Value::from(page)),
        ]);
        self.get(endpoint, &params).await
    }
}
