//! Colocation strategy value object
//!
//! A strategy describes how much idle CPU/memory on a node may be reclaimed
//! for best-effort workloads and when reclamation must be switched off
//! because node metrics went stale. Every field is optional: an unset field
//! falls back to the next layer (node-group override → cluster default).

use serde::{Deserialize, Serialize};

/// Default CPU reclaim threshold (percent of node allocatable)
pub const DEFAULT_CPU_RECLAIM_THRESHOLD_PERCENT: i64 = 65;

/// Default memory reclaim threshold (percent of node allocatable)
pub const DEFAULT_MEMORY_RECLAIM_THRESHOLD_PERCENT: i64 = 65;

/// Default staleness after which reclamation degrades (minutes)
pub const DEFAULT_DEGRADE_TIME_MINUTES: i64 = 15;

/// Default maximum age of a node metric update considered fresh (seconds)
pub const DEFAULT_UPDATE_TIME_THRESHOLD_SECONDS: i64 = 300;

/// Default minimum relative change before reclaimable resources are republished
pub const DEFAULT_RESOURCE_DIFF_THRESHOLD: f64 = 0.1;

/// Field names as they appear in serialized documents
pub mod fields {
    pub const ENABLE: &str = "enable";
    pub const CPU_RECLAIM_THRESHOLD_PERCENT: &str = "cpuReclaimThresholdPercent";
    pub const MEMORY_RECLAIM_THRESHOLD_PERCENT: &str = "memoryReclaimThresholdPercent";
    pub const DEGRADE_TIME_MINUTES: &str = "degradeTimeMinutes";
    pub const UPDATE_TIME_THRESHOLD_SECONDS: &str = "updateTimeThresholdSeconds";
    pub const RESOURCE_DIFF_THRESHOLD: &str = "resourceDiffThreshold";
}

/// Reclamation policy for a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColocationStrategy {
    /// Whether reclamation is active at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,

    /// CPU utilization (percent) below which reclaim is permitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_reclaim_threshold_percent: Option<i64>,

    /// Memory utilization (percent) below which reclaim is permitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reclaim_threshold_percent: Option<i64>,

    /// Reclamation is disabled once metrics are older than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrade_time_minutes: Option<i64>,

    /// Maximum age of a metric update that still counts as fresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time_threshold_seconds: Option<i64>,

    /// Minimum relative change in reclaimable resources before publishing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_diff_threshold: Option<f64>,
}

impl ColocationStrategy {
    /// The built-in cluster default
    pub fn default_strategy() -> Self {
        Self {
            enable: Some(false),
            cpu_reclaim_threshold_percent: Some(DEFAULT_CPU_RECLAIM_THRESHOLD_PERCENT),
            memory_reclaim_threshold_percent: Some(DEFAULT_MEMORY_RECLAIM_THRESHOLD_PERCENT),
            degrade_time_minutes: Some(DEFAULT_DEGRADE_TIME_MINUTES),
            update_time_threshold_seconds: Some(DEFAULT_UPDATE_TIME_THRESHOLD_SECONDS),
            resource_diff_threshold: Some(DEFAULT_RESOURCE_DIFF_THRESHOLD),
        }
    }

    /// Returns true if no field is set
    pub fn is_empty(&self) -> bool {
        self.enable.is_none()
            && self.cpu_reclaim_threshold_percent.is_none()
            && self.memory_reclaim_threshold_percent.is_none()
            && self.degrade_time_minutes.is_none()
            && self.update_time_threshold_seconds.is_none()
            && self.resource_diff_threshold.is_none()
    }

    /// Returns true if reclamation is explicitly enabled
    pub fn is_enabled(&self) -> bool {
        self.enable.unwrap_or(false)
    }

    /// Name of the first present field that is not strictly positive
    pub fn first_non_positive_field(&self) -> Option<&'static str> {
        let ints = [
            (
                fields::CPU_RECLAIM_THRESHOLD_PERCENT,
                self.cpu_reclaim_threshold_percent,
            ),
            (
                fields::MEMORY_RECLAIM_THRESHOLD_PERCENT,
                self.memory_reclaim_threshold_percent,
            ),
            (fields::DEGRADE_TIME_MINUTES, self.degrade_time_minutes),
            (
                fields::UPDATE_TIME_THRESHOLD_SECONDS,
                self.update_time_threshold_seconds,
            ),
        ];

        for (name, value) in ints {
            if matches!(value, Some(v) if v <= 0) {
                return Some(name);
            }
        }

        // NaN is rejected too: it is neither positive nor comparable
        match self.resource_diff_threshold {
            Some(v) if !(v > 0.0) => Some(fields::RESOURCE_DIFF_THRESHOLD),
            _ => None,
        }
    }

    /// Returns a new strategy: `self` with every field present in `patch`
    /// replaced by the patch's value.
    ///
    /// Fields absent from `patch` keep `self`'s value. Neither input is
    /// modified.
    pub fn merged_with(&self, patch: &ColocationStrategy) -> ColocationStrategy {
        ColocationStrategy {
            enable: patch.enable.or(self.enable),
            cpu_reclaim_threshold_percent: patch
                .cpu_reclaim_threshold_percent
                .or(self.cpu_reclaim_threshold_percent),
            memory_reclaim_threshold_percent: patch
                .memory_reclaim_threshold_percent
                .or(self.memory_reclaim_threshold_percent),
            degrade_time_minutes: patch.degrade_time_minutes.or(self.degrade_time_minutes),
            update_time_threshold_seconds: patch
                .update_time_threshold_seconds
                .or(self.update_time_threshold_seconds),
            resource_diff_threshold: patch
                .resource_diff_threshold
                .or(self.resource_diff_threshold),
        }
    }
}
