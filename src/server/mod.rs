// src/server/mod.rs
//! Renaming package index proxy
//!
//! This module provides an HTTP server that:
//! - Serves a PEP 503/691 simple index in front of one or more upstreams
//! - Lists renamed projects with version-filtered, renamed wheel filenames
//! - Renames wheels on download, in memory, on a blocking worker
//! - Passes projects without a rule straight through to upstream
//!
//! Configuration is an immutable [`ProxyConfig`] snapshot. `POST
//! /admin/reload` builds a new one and swaps it; requests already running
//! keep the snapshot they started with.

pub mod cache;
pub mod config;
mod handlers;
pub mod html;
pub mod metrics;
mod routes;
pub mod transform;
pub mod upstream;

pub use cache::{CacheKey, CachedRename, RenameCache};
pub use config::{ConfigOverrides, ConfigSource, ProxyConfig, RenameRule};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use routes::create_router;
pub use transform::{Download, Transform};
pub use upstream::{ArtifactSource, HttpUpstream, UpstreamArtifact};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds the upstream source for a configuration
pub type SourceFactory = Arc<dyn Fn(&ProxyConfig) -> Result<Arc<dyn ArtifactSource>> + Send + Sync>;

/// HTTP upstream factory used by the server binary
pub fn http_source_factory() -> SourceFactory {
    Arc::new(|config: &ProxyConfig| -> Result<Arc<dyn ArtifactSource>> {
        let upstream = HttpUpstream::new(&config.upstreams, config.upstream_timeout)?;
        Ok(Arc::new(upstream) as Arc<dyn ArtifactSource>)
    })
}

/// Configuration and upstream source used together by one request
#[derive(Clone)]
pub struct Snapshot {
    pub config: Arc<ProxyConfig>,
    pub source: Arc<dyn ArtifactSource>,
}

/// Shared server state
pub struct ProxyState {
    config: RwLock<Arc<ProxyConfig>>,
    source: RwLock<Arc<dyn ArtifactSource>>,
    /// Where the configuration came from, if it can be reloaded
    config_source: Option<ConfigSource>,
    factory: SourceFactory,
    pub cache: RenameCache,
    pub metrics: Arc<ProxyMetrics>,
}

impl ProxyState {
    /// State over a fixed source; reload is unavailable
    pub fn new(config: ProxyConfig, source: Arc<dyn ArtifactSource>) -> Self {
        let fixed = Arc::clone(&source);
        let factory: SourceFactory = Arc::new(move |_: &ProxyConfig| -> Result<Arc<dyn ArtifactSource>> {
            Ok(Arc::clone(&fixed))
        });
        Self {
            cache: RenameCache::new(config.cache_entries),
            config: RwLock::new(Arc::new(config)),
            source: RwLock::new(source),
            config_source: None,
            factory,
            metrics: Arc::new(ProxyMetrics::new()),
        }
    }

    /// Load configuration and build the upstream source from it
    pub fn load(config_source: ConfigSource, factory: SourceFactory) -> Result<Self> {
        let config = config_source.load()?;
        let source = factory(&config).context("Failed to create upstream client")?;
        let mut state = Self::new(config, source);
        state.config_source = Some(config_source);
        state.factory = factory;
        Ok(state)
    }

    /// Current configuration and source, taken together
    pub async fn snapshot(&self) -> Snapshot {
        // Reload takes both write locks in this order
        let config = self.config.read().await;
        let source = self.source.read().await;
        Snapshot {
            config: Arc::clone(&config),
            source: Arc::clone(&source),
        }
    }

    pub fn can_reload(&self) -> bool {
        self.config_source.is_some()
    }

    /// Re-read the configuration and swap it in
    ///
    /// On failure the running configuration stays in place.
    pub async fn reload(&self) -> Result<Arc<ProxyConfig>> {
        let config_source = self
            .config_source
            .clone()
            .context("Configuration was not loaded from a reloadable source")?;

        let new_config = tokio::task::spawn_blocking(move || config_source.load())
            .await
            .context("Configuration reload task failed")??;
        let new_source = (self.factory)(&new_config).context("Failed to create upstream client")?;
        let new_config = Arc::new(new_config);

        let mut config = self.config.write().await;
        let mut source = self.source.write().await;

        if config.bind_addr != new_config.bind_addr {
            tracing::warn!(
                "Bind address change to {} takes effect on restart",
                new_config.bind_addr
            );
        }
        if config.cache_entries != new_config.cache_entries {
            tracing::warn!("cache_entries change takes effect on restart");
        }

        *config = Arc::clone(&new_config);
        *source = new_source;
        self.metrics.record_reload();

        tracing::info!(
            "Configuration reloaded: {} rule(s), {} upstream(s)",
            new_config.rules.len(),
            new_config.upstreams.len()
        );
        Ok(new_config)
    }
}

/// Start the proxy server
pub async fn run_server(config_source: ConfigSource) -> Result<()> {
    let state = ProxyState::load(config_source, http_source_factory())?;
    let config = state.snapshot().await.config;

    tracing::info!("Starting spare-tire proxy on {}", config.bind_addr);
    for upstream in &config.upstreams {
        tracing::info!("Upstream: {}", upstream);
    }
    for rule in &config.rules {
        match rule.version_spec {
            Some(ref spec) => tracing::info!("Rename: {} -> {} ({})", rule.original, rule.new_name, spec),
            None => tracing::info!("Rename: {} -> {}", rule.original, rule.new_name),
        }
    }
    if config.cache_entries > 0 {
        tracing::info!("Result cache: {} entries", config.cache_entries);
    }

    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("spare-tire is ready to serve");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
