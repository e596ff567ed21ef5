//! Observability infrastructure for colocation strategy resolution
//!
//! Provides:
//! - Prometheus metrics (resolution outcomes and latency, config generation,
//!   rejected overrides, hook traffic)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for resolution latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000001, 0.000005, 0.00001, 0.000025, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.005,
];

/// Resolution outcome label values
pub mod outcomes {
    pub const MATCHED: &str = "matched";
    pub const DEFAULT: &str = "default";
    pub const FAILED: &str = "failed";
}

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ColocationMetricsInner> = OnceLock::new();

struct ColocationMetricsInner {
    resolve_latency_seconds: Histogram,
    resolutions_total: IntCounterVec,
    invalid_overrides_total: IntCounter,
    config_generation: IntGauge,
    config_reload_errors_total: IntCounter,
    node_groups: IntGauge,
    nodes_tracked: IntGauge,
    hook_requests_total: IntCounterVec,
}

impl ColocationMetricsInner {
    fn new() -> Self {
        Self {
            resolve_latency_seconds: register_histogram!(
                "colocation_resolve_latency_seconds",
                "Time spent resolving a node's colocation strategy",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register resolve_latency_seconds"),

            resolutions_total: register_int_counter_vec!(
                "colocation_resolutions_total",
                "Strategy resolutions by outcome",
                &["outcome"]
            )
            .expect("Failed to register resolutions_total"),

            invalid_overrides_total: register_int_counter!(
                "colocation_invalid_overrides_total",
                "Node-group overrides dropped by validation"
            )
            .expect("Failed to register invalid_overrides_total"),

            config_generation: register_int_gauge!(
                "colocation_config_generation",
                "Generation of the currently published colocation config"
            )
            .expect("Failed to register config_generation"),

            config_reload_errors_total: register_int_counter!(
                "colocation_config_reload_errors_total",
                "Colocation config loads that were rejected"
            )
            .expect("Failed to register config_reload_errors_total"),

            node_groups: register_int_gauge!(
                "colocation_node_groups",
                "Valid node-group overrides in the published config"
            )
            .expect("Failed to register node_groups"),

            nodes_tracked: register_int_gauge!(
                "colocation_nodes_tracked",
                "Nodes currently held in the node cache"
            )
            .expect("Failed to register nodes_tracked"),

            hook_requests_total: register_int_counter_vec!(
                "colocation_hook_requests_total",
                "Runtime hook requests by hook and decision",
                &["hook", "allowed"]
            )
            .expect("Failed to register hook_requests_total"),
        }
    }
}

/// Colocation metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ColocationMetrics {
    _private: (),
}

impl Default for ColocationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ColocationMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ColocationMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ColocationMetricsInner {
        GLOBAL_METRICS.get_or_init(ColocationMetricsInner::new)
    }

    /// Record a resolution and its latency
    pub fn observe_resolution(&self, outcome: &str, duration_secs: f64) {
        self.inner().resolve_latency_seconds.observe(duration_secs);
        self.inner()
            .resolutions_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_invalid_overrides(&self, count: u64) {
        self.inner().invalid_overrides_total.inc_by(count);
    }

    /// Update gauges after a config publish
    pub fn set_config(&self, generation: u64, node_groups: usize) {
        self.inner().config_generation.set(generation as i64);
        self.inner().node_groups.set(node_groups as i64);
    }

    pub fn inc_config_reload_errors(&self) {
        self.inner().config_reload_errors_total.inc();
    }

    pub fn set_nodes_tracked(&self, count: usize) {
        self.inner().nodes_tracked.set(count as i64);
    }

    pub fn inc_hook_request(&self, hook: &str, allowed: bool) {
        self.inner()
            .hook_requests_total
            .with_label_values(&[hook, if allowed { "true" } else { "false" }])
            .inc();
    }
}

/// Structured logger for colocation events
///
/// Emits JSON records carrying an `event` field so log pipelines can
/// filter config changes and hook decisions.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a published config
    pub fn log_config_published(&self, source: &str, generation: u64, node_groups: usize, dropped: usize) {
        info!(
            event = "config_published",
            node = %self.node_name,
            source = %source,
            generation = generation,
            node_groups = node_groups,
            dropped_overrides = dropped,
            "Published colocation config"
        );
    }

    /// Log an override dropped by validation
    pub fn log_override_rejected(&self, source: &str, index: usize, reason: &str) {
        warn!(
            event = "override_rejected",
            node = %self.node_name,
            source = %source,
            index = index,
            reason = %reason,
            "Dropped invalid node colocation config"
        );
    }

    /// Log a config document rejected as a whole
    pub fn log_config_rejected(&self, source: &str, reason: &str) {
        warn!(
            event = "config_rejected",
            node = %self.node_name,
            source = %source,
            reason = %reason,
            "Rejected colocation config, keeping previous version"
        );
    }

    /// Log a resolution result
    pub fn log_strategy_resolved(&self, target_node: &str, matched_group: Option<usize>, enabled: bool) {
        debug!(
            event = "strategy_resolved",
            node = %self.node_name,
            target_node = %target_node,
            matched_group = ?matched_group,
            enabled = enabled,
            "Resolved colocation strategy"
        );
    }

    /// Log a runtime hook decision
    pub fn log_hook_decision(&self, hook: &str, pod_uid: &str, qos_class: &str, allowed: bool) {
        if allowed {
            debug!(
                event = "hook_decision",
                node = %self.node_name,
                hook = %hook,
                pod_uid = %pod_uid,
                qos_class = %qos_class,
                allowed = true,
                "Runtime hook allowed"
            );
        } else {
            info!(
                event = "hook_decision",
                node = %self.node_name,
                hook = %hook,
                pod_uid = %pod_uid,
                qos_class = %qos_class,
                allowed = false,
                "Runtime hook denied"
            );
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            "Colocation agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Colocation agent shutting down"
        );
    }
}
