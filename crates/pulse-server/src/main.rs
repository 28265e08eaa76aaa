//! Pulse server binary.

use std::sync::Arc;

use anyhow::Context;
use pulse_cache::{CacheClient, KvStore, MemoryStore, RedisStore};
use pulse_server::middleware::cors_layer;
use pulse_server::{AppState, CacheBackend, Janitor, Settings, run_server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    let addr = settings.listen_addr().context("invalid listen address")?;

    tracing::info!(
        version = pulse_server::version(),
        backend = ?settings.cache.backend,
        namespace = %settings.cache.namespace,
        "Starting Pulse server"
    );

    let store: Arc<dyn KvStore> = match settings.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new(settings.cache.memory_capacity)),
        CacheBackend::Redis => match RedisStore::connect(&settings.cache.url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                // Sin cache el servicio sigue respondiendo en modo degradado
                tracing::warn!(
                    error = %e,
                    url = %settings.cache.url,
                    "Redis unreachable, falling back to in-memory cache"
                );
                Arc::new(MemoryStore::new(settings.cache.memory_capacity))
            },
        },
    };

    let cache = CacheClient::new(store, settings.cache.to_config());
    if let Err(e) = cache.connect().await {
        tracing::warn!(error = %e, "Cache unavailable, running without cache");
    }

    let prometheus =
        pulse_server::metrics::init_metrics().context("failed to install metrics recorder")?;
    let state = AppState::from_settings(&settings, cache.clone());

    let janitor = Janitor::new(
        Arc::clone(&state.monitor),
        Arc::clone(&state.queries),
        settings.query.max_age(),
    )
    .start(settings.monitor.cleanup_interval());
    let resources = state.resources.start(settings.resources.interval());

    let cors = cors_layer(&settings.server.cors_origins);
    let served = run_server(addr, state, prometheus, cors).await;

    janitor.shutdown().await;
    resources.shutdown().await;
    cache.disconnect();
    tracing::info!("Pulse server stopped");

    served.context("server error")
}
