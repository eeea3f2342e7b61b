//! Process wiring: logging, backends, poller, agent and HTTP server.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{ApiServer, ApiState};
use crate::config::{AppConfig, IndexConfig, LoggingConfig, StoreConfig};
use crate::index::{
    Embedder, HashingEmbedder, HttpEmbedder, HttpEmbedderConfig, NoopIndex, SemanticIndex,
    SqliteVecIndex,
};
use crate::poller::{self, ReminderPoller};
use crate::service::Services;
use crate::store::{PostgrestConfig, PostgrestStore, SqliteStore, TaskStore};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. The returned guard flushes the
/// file writer and must be held for the life of the process.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };
    let stdout = tracing_subscriber::fmt::layer();

    match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskpilot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(stdout)
                .with(file)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter())
                .with(stdout)
                .try_init();
            None
        }
    }
}

/// PostgREST when credentials are configured, else SQLite.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn TaskStore>> {
    if let Some((url, key)) = config.postgrest() {
        info!(url, "using PostgREST store");
        let store = PostgrestStore::new(PostgrestConfig::new(url, key))?;
        return Ok(Arc::new(store));
    }
    let path = config.effective_database_path();
    info!(path = %path.display(), "using SQLite store");
    let store = SqliteStore::open(&path)
        .with_context(|| format!("opening task database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// The vector index, or a no-op index when disabled or unavailable.
///
/// Search then falls back to text matching.
pub fn open_index(config: &IndexConfig) -> Arc<dyn SemanticIndex> {
    if !config.enabled {
        info!("semantic index disabled");
        return Arc::new(NoopIndex);
    }
    let embedder: Arc<dyn Embedder> = match config.embedding_api_key.as_deref() {
        Some(key) => {
            let mut http = HttpEmbedderConfig::new(key, config.embedding_model.clone())
                .with_dim(config.dim);
            if let Some(url) = &config.embedding_base_url {
                http = http.with_base_url(url.clone());
            }
            Arc::new(HttpEmbedder::new(http))
        }
        None => Arc::new(HashingEmbedder::new(config.dim)),
    };
    let path = config.effective_path();
    match SqliteVecIndex::open(&path, embedder) {
        Ok(index) => {
            info!(path = %path.display(), "semantic index ready");
            Arc::new(index)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "semantic index unavailable, search will use text matching");
            Arc::new(NoopIndex)
        }
    }
}

/// Run the server until ctrl-c.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = open_store(&config.store)?;
    let index = open_index(&config.index);
    let services = Services::new(Arc::clone(&store), index);
    let cancel = CancellationToken::new();

    let poller_handle = if config.scheduler.enabled {
        Some(poller::runner::spawn(
            ReminderPoller::new(store),
            config.scheduler.interval(),
            cancel.child_token(),
        ))
    } else {
        info!("reminder poller disabled");
        None
    };

    let agent = match crate::agent::build(&config.llm, services.clone()) {
        Ok(agent) => {
            info!(provider = agent.provider_name(), "assistant ready");
            Some(Arc::new(agent))
        }
        Err(e) => {
            warn!(error = %e, "assistant disabled");
            None
        }
    };

    let state = ApiState::new(services, agent).with_debug(config.server.debug);
    let server = ApiServer::start(state, &config.server.bind_addr(), cancel.child_token()).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");
    cancel.cancel();
    server.stopped().await;
    if let Some(handle) = poller_handle {
        let _ = handle.await;
    }
    Ok(())
}
