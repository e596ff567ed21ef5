//! Node colocation strategy resolution
//!
//! This crate provides:
//! - The colocation strategy model and its cluster defaults
//! - Validation of strategies and node-group overrides
//! - Label-selector matching and first-match-wins resolution
//! - A snapshot store, config loader and file watcher
//! - A node cache and the runtime hook server
//! - Health checks and observability

pub mod config;
pub mod health;
pub mod hooks;
pub mod loader;
pub mod models;
pub mod nodes;
pub mod observability;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod strategy;
pub mod validation;

pub use config::{ColocationConfig, NodeColocationConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use observability::{ColocationMetrics, StructuredLogger};
pub use resolver::{
    matched_group, resolve, resolve_labels, try_resolve, try_resolve_labels, Resolution,
    ResolveError,
};
pub use selector::{Labels, Selector, SelectorError};
pub use store::{Snapshot, StoredResolution, StrategyStore};
pub use strategy::ColocationStrategy;
pub use validation::{is_node_config_valid, is_strategy_valid, ValidationError};
