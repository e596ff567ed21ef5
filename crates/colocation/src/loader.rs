//! Colocation config loading
//!
//! Turns a JSON document into a published [`ColocationConfig`]:
//! - an invalid default strategy rejects the whole document and the
//!   previous snapshot stays in place
//! - invalid node-group overrides are dropped (order of the rest is kept)
//!   and reported through logs and metrics
//!
//! [`ConfigWatcher`] reloads the document whenever its file changes.

use crate::config::ColocationConfig;
use crate::health::{components, HealthRegistry};
use crate::observability::{ColocationMetrics, StructuredLogger};
use crate::store::StrategyStore;
use crate::validation::{validate_node_config, validate_strategy, ValidationError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Kubernetes ConfigMap volumes swap content through this symlink
const CONFIGMAP_DATA_LINK: &str = "..data";

/// Backoff between attempts to watch a directory that does not exist yet
const WATCH_RETRY_INITIAL: Duration = Duration::from_millis(250);
const WATCH_RETRY_MAX: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse colocation config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("default strategy is invalid: {0}")]
    InvalidDefault(#[source] ValidationError),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Override removed during sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedOverride {
    /// Position in the submitted document
    pub index: usize,
    pub error: ValidationError,
}

/// Result of sanitizing a document
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// Config with only valid overrides, in document order
    pub config: ColocationConfig,
    pub rejected: Vec<RejectedOverride>,
}

/// Parse a JSON colocation config document
pub fn parse(bytes: &[u8]) -> Result<ColocationConfig, LoadError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Validate a config, dropping invalid overrides
pub fn sanitize(config: ColocationConfig) -> Result<LoadReport, LoadError> {
    validate_strategy(Some(&config.strategy)).map_err(LoadError::InvalidDefault)?;

    let ColocationConfig {
        strategy,
        node_configs,
    } = config;

    let mut kept = Vec::with_capacity(node_configs.len());
    let mut rejected = Vec::new();

    for (index, node_config) in node_configs.into_iter().enumerate() {
        match validate_node_config(Some(&node_config)) {
            Ok(_) => kept.push(node_config),
            Err(error) => rejected.push(RejectedOverride { index, error }),
        }
    }

    Ok(LoadReport {
        config: ColocationConfig {
            strategy,
            node_configs: kept,
        },
        rejected,
    })
}

/// Validates documents and publishes them into a store
pub struct ConfigLoader {
    store: Arc<StrategyStore>,
    metrics: ColocationMetrics,
    logger: StructuredLogger,
}

impl ConfigLoader {
    pub fn new(store: Arc<StrategyStore>, metrics: ColocationMetrics, logger: StructuredLogger) -> Self {
        Self {
            store,
            metrics,
            logger,
        }
    }

    pub fn store(&self) -> &Arc<StrategyStore> {
        &self.store
    }

    /// Sanitize and publish a parsed config, returning the new generation
    pub fn apply(&self, source: &str, config: ColocationConfig) -> Result<u64, LoadError> {
        let report = match sanitize(config) {
            Ok(report) => report,
            Err(e) => {
                self.metrics.inc_config_reload_errors();
                self.logger.log_config_rejected(source, &e.to_string());
                return Err(e);
            }
        };

        for rejected in &report.rejected {
            self.logger
                .log_override_rejected(source, rejected.index, &rejected.error.to_string());
        }
        self.metrics.inc_invalid_overrides(report.rejected.len() as u64);

        let node_groups = report.config.node_configs.len();
        let generation = self.store.publish(report.config);

        self.metrics.set_config(generation, node_groups);
        self.logger
            .log_config_published(source, generation, node_groups, report.rejected.len());

        Ok(generation)
    }

    /// Parse, sanitize and publish a JSON document
    pub fn apply_bytes(&self, source: &str, bytes: &[u8]) -> Result<u64, LoadError> {
        match parse(bytes) {
            Ok(config) => self.apply(source, config),
            Err(e) => {
                self.metrics.inc_config_reload_errors();
                self.logger.log_config_rejected(source, &e.to_string());
                Err(e)
            }
        }
    }

    /// Load a document from disk and publish it
    pub fn load_file(&self, path: &Path) -> Result<u64, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| {
            self.metrics.inc_config_reload_errors();
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.apply_bytes(&path.display().to_string(), &bytes)
    }
}

/// Reloads a config file on change
pub struct ConfigWatcher {
    path: PathBuf,
    loader: Arc<ConfigLoader>,
    health: HealthRegistry,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, loader: Arc<ConfigLoader>, health: HealthRegistry) -> Self {
        Self {
            path: path.into(),
            loader,
            health,
        }
    }

    /// Load the file once and update health/readiness accordingly
    pub async fn reload(&self) -> Result<u64, LoadError> {
        let result = self.loader.load_file(&self.path);
        match &result {
            Ok(generation) => {
                self.health.set_healthy(components::CONFIG_LOADER).await;
                self.health.set_ready(true).await;
                debug!(generation = generation, "Colocation config reloaded");
            }
            Err(e) => {
                let generation = self.loader.store().generation();
                self.health
                    .set_degraded(
                        components::CONFIG_LOADER,
                        format!("{} (serving generation {})", e, generation),
                    )
                    .await;
            }
        }
        result
    }

    /// Watch the file's directory and reload on change until shutdown
    ///
    /// The directory is watched rather than the file so that atomic
    /// replacements (rename, ConfigMap symlink swaps) are seen. A missing
    /// directory is retried with backoff until it appears.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), LoadError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| LoadError::Watch {
            path: dir.clone(),
            source,
        })?;

        // Watch first so a change racing the initial load is not lost
        let mut watching = self.start_watch(&mut watcher, &dir).await;
        if let Err(e) = self.reload().await {
            warn!(path = %self.path.display(), error = %e, "Initial colocation config load failed");
        }

        let mut retry_delay = WATCH_RETRY_INITIAL;
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        debug!("Config watcher channel closed");
                        break;
                    };
                    if self.is_relevant(&event) {
                        if let Err(e) = self.reload().await {
                            warn!(path = %self.path.display(), error = %e, "Colocation config reload failed");
                        }
                    }
                }
                _ = tokio::time::sleep(retry_delay), if !watching => {
                    watching = self.start_watch(&mut watcher, &dir).await;
                    if watching {
                        retry_delay = WATCH_RETRY_INITIAL;
                        if let Err(e) = self.reload().await {
                            warn!(path = %self.path.display(), error = %e, "Colocation config reload failed");
                        }
                    } else {
                        retry_delay = (retry_delay * 2).min(WATCH_RETRY_MAX);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Stopping colocation config watcher");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Start watching `dir`; a failure is reported and retried by the caller
    async fn start_watch(&self, watcher: &mut RecommendedWatcher, dir: &Path) -> bool {
        match watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                info!(path = %self.path.display(), "Watching colocation config");
                true
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot watch colocation config directory, retrying");
                self.health
                    .set_degraded(
                        components::CONFIG_LOADER,
                        format!("cannot watch {}: {}", dir.display(), e),
                    )
                    .await;
                false
            }
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return false;
        }
        let target = self.path.file_name();
        event.paths.iter().any(|p| {
            let name = p.file_name();
            name == target || name.map(|n| n == CONFIGMAP_DATA_LINK).unwrap_or(false)
        })
    }
}
