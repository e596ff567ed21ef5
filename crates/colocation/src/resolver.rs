//! Per-node strategy resolution
//!
//! Resolution starts from a copy of the cluster default and applies the
//! first node-group override whose selector matches the node. Entries that
//! fail validation are treated as non-matching, so one malformed entry never
//! blocks resolution for other nodes.

use crate::config::{ColocationConfig, NodeColocationConfig};
use crate::selector::Labels;
use crate::strategy::ColocationStrategy;
use crate::validation::validate_node_config;
use k8s_openapi::api::core::v1::Node;
use thiserror::Error;
use tracing::{debug, warn};

/// Resolution failure
///
/// Callers treat every variant as "no strategy available".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no colocation config available")]
    MissingConfig,

    #[error("no node available")]
    MissingNode,

    #[error("resolved strategy has non-positive field {field}")]
    InvalidStrategy { field: &'static str },
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub strategy: ColocationStrategy,
    /// Index into `node_configs` of the override that applied
    pub matched_group: Option<usize>,
}

/// Resolve against a label set
pub fn try_resolve_labels(
    config: Option<&ColocationConfig>,
    labels: Option<&Labels>,
) -> Result<Resolution, ResolveError> {
    let config = config.ok_or(ResolveError::MissingConfig)?;
    let labels = labels.ok_or(ResolveError::MissingNode)?;

    let mut strategy = config.strategy;
    let matched_group = first_match(config, labels).map(|(index, node_config)| {
        strategy = strategy.merged_with(&node_config.strategy);
        index
    });

    if let Some(field) = strategy.first_non_positive_field() {
        return Err(ResolveError::InvalidStrategy { field });
    }

    Ok(Resolution {
        strategy,
        matched_group,
    })
}

/// First valid override whose selector matches `labels`
fn first_match<'a>(
    config: &'a ColocationConfig,
    labels: &Labels,
) -> Option<(usize, &'a NodeColocationConfig)> {
    config
        .node_configs
        .iter()
        .enumerate()
        .find(|(index, node_config)| match validate_node_config(Some(*node_config)) {
            Ok(selector) => selector.matches(labels),
            Err(e) => {
                debug!(index = *index, error = %e, "Skipping invalid node config");
                false
            }
        })
}

/// Index of the override that applies to `labels`, if any
pub fn matched_group(config: &ColocationConfig, labels: &Labels) -> Option<usize> {
    first_match(config, labels).map(|(index, _)| index)
}

/// Resolve the strategy for a node, reporting why resolution failed
pub fn try_resolve(
    config: Option<&ColocationConfig>,
    node: Option<&Node>,
) -> Result<Resolution, ResolveError> {
    let node = node.ok_or(ResolveError::MissingNode)?;
    let empty = Labels::new();
    let labels = node.metadata.labels.as_ref().unwrap_or(&empty);
    try_resolve_labels(config, Some(labels))
}

/// Resolve the strategy for a node
///
/// Returns `None` when config or node is absent, or when the merged result
/// would carry a non-positive field.
pub fn resolve(config: Option<&ColocationConfig>, node: Option<&Node>) -> Option<ColocationStrategy> {
    match try_resolve(config, node) {
        Ok(resolution) => Some(resolution.strategy),
        Err(e) => {
            let node_name = node
                .and_then(|n| n.metadata.name.as_deref())
                .unwrap_or("<none>");
            warn!(node = %node_name, error = %e, "Failed to resolve colocation strategy");
            None
        }
    }
}

/// Label-set counterpart of [`resolve`]
pub fn resolve_labels(
    config: Option<&ColocationConfig>,
    labels: Option<&Labels>,
) -> Option<ColocationStrategy> {
    match try_resolve_labels(config, labels) {
        Ok(resolution) => Some(resolution.strategy),
        Err(e) => {
            warn!(error = %e, "Failed to resolve colocation strategy");
            None
        }
    }
}
