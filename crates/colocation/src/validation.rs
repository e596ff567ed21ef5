//! Validation rules for strategies and node-group overrides
//!
//! The `is_*` predicates are what the resolver consults; the `validate_*`
//! forms report which rule failed so loaders and tooling can explain a
//! rejected entry.

use crate::config::NodeColocationConfig;
use crate::selector::{Selector, SelectorError};
use crate::strategy::ColocationStrategy;
use thiserror::Error;

/// Reason a strategy or override was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("strategy is missing")]
    MissingStrategy,

    #[error("node config is missing")]
    MissingNodeConfig,

    #[error("field {field} must be greater than zero")]
    NonPositiveField { field: &'static str },

    #[error("node selector is missing")]
    MissingSelector,

    #[error("node selector matchLabels must not be empty")]
    EmptyMatchLabels,

    #[error("node selector is invalid: {0}")]
    InvalidSelector(#[from] SelectorError),

    #[error("node config overrides no strategy field")]
    EmptyOverride,
}

/// Check that every present field of a strategy is strictly positive
pub fn validate_strategy(strategy: Option<&ColocationStrategy>) -> Result<(), ValidationError> {
    let strategy = strategy.ok_or(ValidationError::MissingStrategy)?;
    match strategy.first_non_positive_field() {
        Some(field) => Err(ValidationError::NonPositiveField { field }),
        None => Ok(()),
    }
}

/// Check a node-group override
///
/// The selector must carry at least one `matchLabels` entry and convert into
/// a matcher, and the override must set at least one field. Field values
/// are checked as well, since an override with a non-positive field can
/// never be merged.
pub fn validate_node_config(
    node_config: Option<&NodeColocationConfig>,
) -> Result<Selector, ValidationError> {
    let node_config = node_config.ok_or(ValidationError::MissingNodeConfig)?;
    let selector = node_config
        .node_selector
        .as_ref()
        .ok_or(ValidationError::MissingSelector)?;

    match &selector.match_labels {
        Some(labels) if !labels.is_empty() => {}
        _ => return Err(ValidationError::EmptyMatchLabels),
    }

    let matcher = Selector::from_label_selector(Some(selector))?;

    if node_config.strategy.is_empty() {
        return Err(ValidationError::EmptyOverride);
    }

    validate_strategy(Some(&node_config.strategy))?;

    Ok(matcher)
}

pub fn is_strategy_valid(strategy: Option<&ColocationStrategy>) -> bool {
    validate_strategy(strategy).is_ok()
}

pub fn is_node_config_valid(node_config: Option<&NodeColocationConfig>) -> bool {
    validate_node_config(node_config).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        LabelSelector, LabelSelectorRequirement,
    };
    use std::collections::BTreeMap;

    fn enable_only() -> ColocationStrategy {
        ColocationStrategy {
            enable: Some(true),
            ..Default::default()
        }
    }

    fn with_field(index: usize, value: i64) -> ColocationStrategy {
        let mut s = ColocationStrategy::default();
        match index {
            0 => s.cpu_reclaim_threshold_percent = Some(value),
            1 => s.memory_reclaim_threshold_percent = Some(value),
            2 => s.degrade_time_minutes = Some(value),
            3 => s.update_time_threshold_seconds = Some(value),
            _ => s.resource_diff_threshold = Some(value as f64),
        }
        s
    }

    #[test]
    fn test_strategy_missing_is_invalid() {
        assert!(!is_strategy_valid(None));
        assert_eq!(
            validate_strategy(None),
            Err(ValidationError::MissingStrategy)
        );
    }

    #[test]
    fn test_unset_fields_are_valid() {
        assert!(is_strategy_valid(Some(&ColocationStrategy::default())));
        assert!(is_strategy_valid(Some(&ColocationStrategy::default_strategy())));
        assert!(is_strategy_valid(Some(&ColocationStrategy {
            enable: Some(false),
            ..Default::default()
        })));
    }

    #[test]
    fn test_every_non_positive_field_is_invalid() {
        for index in 0..5 {
            for value in [0, -1, -100] {
                let s = with_field(index, value);
                assert!(!is_strategy_valid(Some(&s)), "{:?} should be invalid", s);
            }
            assert!(is_strategy_valid(Some(&with_field(index, 1))));
        }
    }

    #[test]
    fn test_non_positive_field_in_combination_is_invalid() {
        // Every subset of fields with one non-positive member
        for mask in 1u32..32 {
            for bad in 0..5 {
                if mask & (1 << bad) == 0 {
                    continue;
                }
                let mut s = ColocationStrategy::default();
                for index in 0..5 {
                    if mask & (1 << index) == 0 {
                        continue;
                    }
                    let value = if index == bad { 0 } else { 10 };
                    let f = with_field(index, value);
                    s = s.merged_with(&f);
                }
                assert!(!is_strategy_valid(Some(&s)));
                let node_config =
                    NodeColocationConfig::for_labels([("zone", "a")], s);
                assert!(!is_node_config_valid(Some(&node_config)));
            }
        }
    }

    #[test]
    fn test_valid_node_config() {
        let node_config = NodeColocationConfig::for_labels([("zone", "a")], enable_only());
        assert!(is_node_config_valid(Some(&node_config)));
        let matcher = validate_node_config(Some(&node_config)).unwrap();
        let labels: BTreeMap<String, String> =
            [("zone".to_string(), "a".to_string())].into_iter().collect();
        assert!(matcher.matches(&labels));
    }

    #[test]
    fn test_node_config_missing() {
        assert!(!is_node_config_valid(None));
    }

    #[test]
    fn test_node_config_without_selector() {
        let node_config = NodeColocationConfig {
            node_selector: None,
            strategy: enable_only(),
        };
        assert_eq!(
            validate_node_config(Some(&node_config)),
            Err(ValidationError::MissingSelector)
        );
    }

    #[test]
    fn test_node_config_empty_match_labels() {
        let empty = NodeColocationConfig::for_labels(Vec::<(String, String)>::new(), enable_only());
        assert_eq!(
            validate_node_config(Some(&empty)),
            Err(ValidationError::EmptyMatchLabels)
        );

        // Expressions alone do not satisfy the matchLabels requirement
        let expressions_only = NodeColocationConfig {
            node_selector: Some(LabelSelector {
                match_labels: None,
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: "zone".to_string(),
                    operator: "Exists".to_string(),
                    values: None,
                }]),
            }),
            strategy: enable_only(),
        };
        assert!(!is_node_config_valid(Some(&expressions_only)));
    }

    #[test]
    fn test_node_config_unparseable_selector() {
        let node_config = NodeColocationConfig::for_labels([("bad key", "a")], enable_only());
        assert!(matches!(
            validate_node_config(Some(&node_config)),
            Err(ValidationError::InvalidSelector(SelectorError::InvalidKey { .. }))
        ));

        let node_config = NodeColocationConfig {
            node_selector: Some(LabelSelector {
                match_labels: Some([("zone".to_string(), "a".to_string())].into_iter().collect()),
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: "pool".to_string(),
                    operator: "In".to_string(),
                    values: Some(vec![]),
                }]),
            }),
            strategy: enable_only(),
        };
        assert!(!is_node_config_valid(Some(&node_config)));
    }

    #[test]
    fn test_node_config_noop_override() {
        let node_config =
            NodeColocationConfig::for_labels([("zone", "a")], ColocationStrategy::default());
        assert_eq!(
            validate_node_config(Some(&node_config)),
            Err(ValidationError::EmptyOverride)
        );
    }
}
