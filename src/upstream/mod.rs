pub mod tmdb;

use crate::cache::Params;
use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;

pub use tmdb::TmdbClient;

/// Fuente de metadata detrás de la caché.
///
/// `endpoint` es la operación lógica (`movie/popular`, `search/tv`...),
/// no una URL completa.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Obtiene la respuesta JSON de un endpoint
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError>;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;
}
