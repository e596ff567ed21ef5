//! Cluster colocation configuration
//!
//! The document an operator writes: a cluster-wide default strategy plus an
//! ordered list of node-group overrides. The serialized form keeps the
//! strategy fields at the top level of each object:
//!
//! ```json
//! {
//!   "enable": false,
//!   "cpuReclaimThresholdPercent": 65,
//!   "nodeConfigs": [
//!     { "nodeSelector": { "matchLabels": { "zone": "a" } }, "enable": true }
//!   ]
//! }
//! ```

use crate::strategy::ColocationStrategy;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};

/// Default strategy plus ordered node-group overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColocationConfig {
    #[serde(flatten)]
    pub strategy: ColocationStrategy,

    /// Overrides in priority order: the first matching entry wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_configs: Vec<NodeColocationConfig>,
}

impl Default for ColocationConfig {
    fn default() -> Self {
        Self {
            strategy: ColocationStrategy::default_strategy(),
            node_configs: Vec::new(),
        }
    }
}

impl ColocationConfig {
    pub fn new(strategy: ColocationStrategy) -> Self {
        Self {
            strategy,
            node_configs: Vec::new(),
        }
    }

    /// Append an override at the lowest priority
    pub fn with_node_config(mut self, node_config: NodeColocationConfig) -> Self {
        self.node_configs.push(node_config);
        self
    }
}

/// Strategy override scoped to the nodes a selector matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeColocationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<LabelSelector>,

    #[serde(flatten)]
    pub strategy: ColocationStrategy,
}

impl NodeColocationConfig {
    /// Override selected by equality on every given label
    pub fn for_labels<I, K, V>(labels: I, strategy: ColocationStrategy) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            node_selector: Some(LabelSelector {
                match_labels: Some(
                    labels
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                ),
                match_expressions: None,
            }),
            strategy,
        }
    }
}
