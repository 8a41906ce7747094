use super::MetadataSource;
use crate::cache::Params;
use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";

/// Cliente HTTP para la API de TMDB.
pub struct TmdbClient {
    base_url: Url,
    api_key: String,
    language: Option<String>,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut base_url = Url::parse(base_url)?;
        // Sin barra final, `join` reemplazaría el último segmento (p. ej. "/3")
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cine-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            language: None,
            client,
        })
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// URL completa para un endpoint, con la API key y los parámetros en la query.
    pub fn endpoint_url(&self, endpoint: &str, params: &Params) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            if let Some(language) = &self.language {
                if !params.contains_key("language") {
                    query.append_pair("language", language);
                }
            }
            for (name, value) in params {
                query.append_pair(name, &query_value(value));
            }
        }
        Ok(url)
    }
}

impl fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url.as_str())
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let url = self.endpoint_url(endpoint, params)?;
        debug!("🌐 GET {} {:?}", endpoint, params);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("❌ TMDB error en {}: {} - {}", endpoint, status, body);
            return Err(UpstreamError::Status { status, body });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn source_name(&self) -> &'static str {
        "TMDB"
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
