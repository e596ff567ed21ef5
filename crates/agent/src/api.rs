//! HTTP API: health checks, Prometheus metrics, node registration and
//! strategy lookup

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use colocation::{
    health::{ComponentStatus, HealthRegistry},
    models::{ConfigSnapshot, ErrorResponse, NodeLabelsRequest, NodeStrategy, NodeSummary},
    nodes::{new_node, node_labels, NodeCache},
    observability::{outcomes, ColocationMetrics, StructuredLogger},
    Selector, StoredResolution, StrategyStore,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ColocationMetrics,
    pub logger: StructuredLogger,
    pub store: Arc<StrategyStore>,
    pub nodes: Arc<NodeCache>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ColocationMetrics,
        logger: StructuredLogger,
        store: Arc<StrategyStore>,
        nodes: Arc<NodeCache>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            store,
            nodes,
        }
    }
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Previous config still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a config is published
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Currently published colocation config
async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigSnapshot> {
    let current = state.store.current();
    Json(ConfigSnapshot {
        generation: current.generation,
        config: (*current.config).clone(),
    })
}

#[derive(Debug, Deserialize)]
struct ListNodesQuery {
    #[serde(default)]
    selector: Option<String>,
}

async fn list_nodes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNodesQuery>,
) -> Response {
    let selector = match query.selector.as_deref().map(Selector::parse) {
        None => Selector::everything(),
        Some(Ok(selector)) => selector,
        Some(Err(e)) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let nodes: Vec<NodeSummary> = state
        .nodes
        .list(&selector)
        .iter()
        .map(|node| NodeSummary {
            name: node.metadata.name.clone().unwrap_or_default(),
            labels: node_labels(node),
        })
        .collect();

    Json(nodes).into_response()
}

async fn put_node(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<NodeLabelsRequest>,
) -> Response {
    if let Err(e) = Selector::from_labels(&body.labels) {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }

    if let Err(e) = state.nodes.upsert(new_node(name.clone(), body.labels.clone())) {
        return error(StatusCode::BAD_REQUEST, e.to_string());
    }
    state.metrics.set_nodes_tracked(state.nodes.len());

    Json(NodeSummary {
        name,
        labels: body.labels,
    })
    .into_response()
}

async fn delete_node(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match state.nodes.remove(&name) {
        Some(_) => {
            state.metrics.set_nodes_tracked(state.nodes.len());
            StatusCode::NO_CONTENT.into_response()
        }
        None => error(StatusCode::NOT_FOUND, format!("node {:?} not found", name)),
    }
}

/// Resolve the colocation strategy for a registered node
async fn get_node_strategy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let node = match state.nodes.get(&name) {
        Ok(node) => node,
        Err(e) => return error(StatusCode::NOT_FOUND, e.to_string()),
    };

    let start = Instant::now();
    let result = state.store.resolve(&node);
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(StoredResolution {
            generation,
            resolution,
        }) => {
            let outcome = if resolution.matched_group.is_some() {
                outcomes::MATCHED
            } else {
                outcomes::DEFAULT
            };
            state.metrics.observe_resolution(outcome, elapsed);
            state.logger.log_strategy_resolved(
                &name,
                resolution.matched_group,
                resolution.strategy.is_enabled(),
            );

            Json(NodeStrategy {
                node: name,
                strategy: resolution.strategy,
                matched_group: resolution.matched_group,
                generation,
            })
            .into_response()
        }
        Err(e) => {
            state.metrics.observe_resolution(outcomes::FAILED, elapsed);
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/config", get(get_config))
        .route("/v1/nodes", get(list_nodes))
        .route("/v1/nodes/:name", axum::routing::put(put_node).delete(delete_node))
        .route("/v1/nodes/:name/strategy", get(get_node_strategy))
        .with_state(state)
}

/// Serve the API until `shutdown` fires
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
