//! Published colocation config snapshot
//!
//! The store hands out `Arc` snapshots. Publishing swaps the `Arc` under a
//! short write lock and never mutates a published config, so a resolution
//! running against an old snapshot sees a consistent override list.

use crate::config::ColocationConfig;
use crate::resolver::{try_resolve, Resolution, ResolveError};
use k8s_openapi::api::core::v1::Node;
use std::sync::{Arc, RwLock};

/// A published config together with the generation it was published as
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: u64,
    pub config: Arc<ColocationConfig>,
}

/// Result of resolving against one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResolution {
    /// Generation of the snapshot the resolution ran against
    pub generation: u64,
    pub resolution: Resolution,
}

/// Holder of the current colocation config
#[derive(Debug)]
pub struct StrategyStore {
    current: RwLock<Snapshot>,
}

impl Default for StrategyStore {
    fn default() -> Self {
        Self::new(ColocationConfig::default())
    }
}

impl StrategyStore {
    /// Create a store seeded with an initial config (generation 0)
    pub fn new(initial: ColocationConfig) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                generation: 0,
                config: Arc::new(initial),
            }),
        }
    }

    /// Replace the current config, returning the new generation
    pub fn publish(&self, config: ColocationConfig) -> u64 {
        let config = Arc::new(config);
        // A poisoned lock only means a writer panicked between two
        // assignments; the stored snapshot is still whole.
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let generation = guard.generation + 1;
        *guard = Snapshot { generation, config };
        generation
    }

    /// Current config and its generation, read together
    pub fn current(&self) -> Snapshot {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current config snapshot
    pub fn snapshot(&self) -> Arc<ColocationConfig> {
        self.current().config
    }

    /// Number of publishes since creation
    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    /// Resolve a node against the current snapshot
    pub fn resolve(&self, node: &Node) -> Result<StoredResolution, ResolveError> {
        let Snapshot { generation, config } = self.current();
        let resolution = try_resolve(Some(&config), Some(node))?;
        Ok(StoredResolution {
            generation,
            resolution,
        })
    }
}
