use reqwest::StatusCode;
use thiserror::Error;

/// Fallos al consultar la API de metadata.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Código HTTP devuelto por la API, si la respuesta llegó a existir.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}
