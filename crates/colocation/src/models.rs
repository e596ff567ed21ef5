//! Wire models shared by the agent API and the CLI

use crate::config::ColocationConfig;
use crate::selector::Labels;
use crate::strategy::ColocationStrategy;
use serde::{Deserialize, Serialize};

/// Resolved strategy for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStrategy {
    pub node: String,
    pub strategy: ColocationStrategy,
    /// Index of the node-group override that applied, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_group: Option<usize>,
    /// Config generation the strategy was resolved against
    pub generation: u64,
}

/// Node as registered with the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
}

/// Body of a node registration request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLabelsRequest {
    #[serde(default)]
    pub labels: Labels,
}

/// Error body returned by the agent API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Published config and its generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub generation: u64,
    pub config: ColocationConfig,
}
