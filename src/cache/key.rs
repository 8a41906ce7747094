use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Parámetros de consulta normalizados: las claves quedan ordenadas,
/// así el orden en que llegan no afecta la clave de caché.
pub type Params = BTreeMap<String, Value>;

/// Construye [`Params`] desde pares nombre/valor en cualquier orden.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}

/// Deriva la clave de caché canónica para `(endpoint, params)`.
pub fn cache_key(endpoint: &str, params: &Params) -> String {
    // BTreeMap serializa como objeto JSON con claves ordenadas; con claves
    // String y valores `Value` la serialización no puede fallar
    let normalized = serde_json::to_string(params).unwrap_or_default();
    format!("{endpoint}?{normalized}")
}

/// Categoría de un endpoint frente a la caché.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Nunca se cachea.
    Blacklisted,
    /// Listados de alto tráfico servidos desde el tier *base*.
    Primary,
    /// Todo lo demás: tiers *favorite* y *flex*.
    Default,
}

/// Clasifica un endpoint. La lista negra tiene precedencia sobre la primaria.
pub fn classify(
    endpoint: &str,
    primary: &HashSet<String>,
    blacklisted: &HashSet<String>,
) -> EndpointClass {
    if blacklisted.contains(endpoint) {
        EndpointClass::Blacklisted
    } else if primary.contains(endpoint) {
        EndpointClass::Primary
    } else {
        EndpointClass::Default
    }
}
