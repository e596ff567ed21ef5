//! Colocation Agent - per-node colocation strategy resolution
//!
//! This binary runs as a DaemonSet on each Kubernetes node. It watches the
//! colocation config, resolves the local node's strategy and answers
//! container runtime hooks.

use anyhow::{Context, Result};
use colocation::{
    health::{components, HealthRegistry},
    hooks::{HookContext, RuntimeHookServer},
    loader::{ConfigLoader, ConfigWatcher},
    nodes::{new_node, NodeCache},
    observability::{ColocationMetrics, StructuredLogger},
    ColocationConfig, StrategyStore,
};
use colocation_agent::{
    api,
    config::{AgentConfig, FEATURE_RUNTIME_HOOKS},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting colocation-agent");

    let config = AgentConfig::load()?;
    let labels = config.labels()?;
    let hooks_enabled = config.is_enabled(FEATURE_RUNTIME_HOOKS)?;
    info!(
        node_name = %config.node_name,
        config_path = %config.config_path.display(),
        runtime_hooks = hooks_enabled,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONFIG_LOADER).await;
    health_registry.register(components::NODE_CACHE).await;

    let metrics = ColocationMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION);

    // Cluster defaults until the first document is loaded
    let store = Arc::new(StrategyStore::new(ColocationConfig::default()));

    let nodes = Arc::new(NodeCache::new());
    nodes
        .upsert(new_node(config.node_name.clone(), labels))
        .context("Failed to register local node")?;
    metrics.set_nodes_tracked(nodes.len());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = Vec::new();

    let loader = Arc::new(ConfigLoader::new(
        store.clone(),
        metrics.clone(),
        logger.clone(),
    ));
    let watcher = ConfigWatcher::new(config.config_path.clone(), loader, health_registry.clone());
    let watcher_health = health_registry.clone();
    let watcher_shutdown = shutdown_tx.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown).await {
            error!(error = %e, "Config watcher failed");
            watcher_health
                .set_unhealthy(components::CONFIG_LOADER, e.to_string())
                .await;
        }
    }));

    if hooks_enabled {
        health_registry.register(components::HOOK_SERVER).await;
        let context = HookContext {
            node_name: config.node_name.clone(),
            store: store.clone(),
            nodes: nodes.clone(),
            metrics: metrics.clone(),
            logger: logger.clone(),
        };
        let server = RuntimeHookServer::new(config.hook_server_config()?, context)?;
        let hook_health = health_registry.clone();
        let hook_shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(hook_shutdown).await {
                error!(error = %e, "Runtime hook server failed");
                hook_health
                    .set_unhealthy(components::HOOK_SERVER, e.to_string())
                    .await;
            }
        }));
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
        store,
        nodes,
    ));
    let api_port = config.api_port;
    let api_shutdown = shutdown_tx.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state, api_shutdown).await {
            error!(error = %e, "API server failed");
        }
    }));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}
