//! Node cache
//!
//! Local index of the nodes the agent resolves strategies for. Accessors
//! hand out clones; callers must treat them as read-only snapshots.

use crate::selector::{Labels, Selector};
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListerError {
    #[error("node {0:?} not found")]
    NotFound(String),

    #[error("node has no name")]
    MissingName,
}

/// Build a node object carrying only a name and labels
pub fn new_node(name: impl Into<String>, labels: Labels) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.into()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Labels of a node (empty when unset)
pub fn node_labels(node: &Node) -> Labels {
    node.metadata.labels.clone().unwrap_or_default()
}

/// Map of node name -> node
#[derive(Debug, Default)]
pub struct NodeCache {
    nodes: DashMap<String, Node>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node, keyed by `metadata.name`
    pub fn upsert(&self, node: Node) -> Result<(), ListerError> {
        let name = node
            .metadata
            .name
            .clone()
            .ok_or(ListerError::MissingName)?;
        debug!(node = %name, "Caching node");
        self.nodes.insert(name, node);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<Node> {
        debug!(node = %name, "Evicting node");
        self.nodes.remove(name).map(|(_, node)| node)
    }

    /// Retrieve a node by name
    pub fn get(&self, name: &str) -> Result<Node, ListerError> {
        self.nodes
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ListerError::NotFound(name.to_string()))
    }

    /// List nodes whose labels match the selector, sorted by name
    pub fn list(&self, selector: &Selector) -> Vec<Node> {
        let empty = Labels::new();
        let mut nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|entry| {
                let labels = entry.value().metadata.labels.as_ref().unwrap_or(&empty);
                selector.matches(labels)
            })
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
