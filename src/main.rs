use anyhow::Result;
use cine_proxy::cache::{Params, TieredCacheManager};
use cine_proxy::catalog::Catalog;
use cine_proxy::config::Config;
use cine_proxy::upstream::{MetadataSource, TmdbClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

const USAGE: &str = "usage: cine-proxy <endpoint> [name=value ...] [--repeat N] | --health-check";

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging (stdout queda para el JSON)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cine_proxy=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎬 Iniciando cine-proxy v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let client = TmdbClient::new(
        &config.tmdb_base_url,
        config.tmdb_api_key.clone(),
        config.upstream_timeout,
    )?
    .with_language(config.tmdb_language.clone());
    let source: Arc<dyn MetadataSource> = Arc::new(client);

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Manejar health check si es necesario
    if args.iter().any(|arg| arg == "--health-check") {
        return health_check(source.as_ref()).await;
    }

    let request = CliRequest::parse(&args)?;

    // Una sola instancia de caché compartida por todos los consumidores
    let cache = Arc::new(TieredCacheManager::new(config.cache_config()));
    let catalog = Catalog::new(cache.clone(), source);

    let mut response = Value::Null;
    for _ in 0..request.repeat {
        response = match catalog.get(&request.endpoint, &request.params).await {
            Ok(value) => value,
            Err(e) => {
                error!("❌ Error consultando {}: {}", request.endpoint, e);
                return Err(e.into());
            }
        };
    }

    println!("{}", serde_json::to_string_pretty(&response)?);

    let stats = cache.statistics();
    info!(
        "📊 Caché (hit ratio {:.0}%): {}",
        stats.hit_ratio * 100.0,
        serde_json::to_string(&stats)?
    );

    Ok(())
}

async fn health_check(source: &dyn MetadataSource) -> Result<()> {
    match source.fetch("configuration", &Params::new()).await {
        Ok(_) => {
            println!("OK");
            Ok(())
        }
        Err(e) => anyhow::bail!("{} no disponible: {}", source.source_name(), e),
    }
}

#[derive(Debug)]
struct CliRequest {
    endpoint: String,
    params: Params,
    repeat: usize,
}

impl CliRequest {
    fn parse(args: &[String]) -> Result<Self> {
        let mut endpoint = None;
        let mut params = Params::new();
        let mut repeat = 1;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--repeat" {
                let Some(n) = iter.next() else {
                    anyhow::bail!("--repeat needs a value\n{USAGE}");
                };
                repeat = n.parse()?;
            } else if let Some((name, value)) = arg.split_once('=') {
                params.insert(name.to_string(), param_value(value));
            } else if endpoint.is_none() {
                endpoint = Some(arg.trim_matches('/').to_string());
            } else {
                anyhow::bail!("unexpected argument: {arg}\n{USAGE}");
            }
        }

        let Some(endpoint) = endpoint else {
            anyhow::bail!("missing endpoint\n{USAGE}");
        };

        Ok(Self {
            endpoint,
            params,
            repeat: repeat.max(1),
        })
    }
}

/// Números y booleanos se conservan tipados; todo lo demás es texto.
fn param_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
