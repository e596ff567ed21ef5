//! Label selector matching
//!
//! Converts a Kubernetes `LabelSelector` into a [`Selector`] that can be
//! tested against a node's labels. Conversion validates keys, values and
//! operators the same way the API server does, so an entry accepted here
//! would also be accepted by the cluster.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Node label set
pub type Labels = BTreeMap<String, String>;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Error converting a label selector into a matcher
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid label key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid label value {value:?} for key {key:?}")]
    InvalidValue { key: String, value: String },

    #[error("unknown operator {operator:?} for key {key:?}")]
    UnknownOperator { key: String, operator: String },

    #[error("operator {operator} for key {key:?} requires at least one value")]
    MissingValues { key: String, operator: Operator },

    #[error("operator {operator} for key {key:?} must not have values")]
    UnexpectedValues { key: String, operator: Operator },
}

/// Selector requirement operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "In" => Some(Operator::In),
            "NotIn" => Some(Operator::NotIn),
            "Exists" => Some(Operator::Exists),
            "DoesNotExist" => Some(Operator::DoesNotExist),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::In => "In",
            Operator::NotIn => "NotIn",
            Operator::Exists => "Exists",
            Operator::DoesNotExist => "DoesNotExist",
        };
        f.write_str(s)
    }
}

/// A single validated requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a requirement, validating key, values and operator arity
    pub fn new<I, S>(key: &str, operator: Operator, values: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_key(key)?;
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();

        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(SelectorError::MissingValues {
                    key: key.to_string(),
                    operator,
                });
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(SelectorError::UnexpectedValues {
                    key: key.to_string(),
                    operator,
                });
            }
            _ => {}
        }

        for value in &values {
            if !is_valid_value(value) {
                return Err(SelectorError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                });
            }
        }

        Ok(Self {
            key: key.to_string(),
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Test this requirement against a label set
    pub fn matches(&self, labels: &Labels) -> bool {
        match self.operator {
            Operator::In => labels
                .get(&self.key)
                .map(|v| self.values.contains(v))
                .unwrap_or(false),
            Operator::NotIn => labels
                .get(&self.key)
                .map(|v| !self.values.contains(v))
                .unwrap_or(true),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

/// Compiled label matcher
///
/// `Nothing` is what an absent selector converts to. An empty requirement
/// list matches every label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Nothing,
    Requirements(Vec<Requirement>),
}

impl Selector {
    /// Selector matching every label set
    pub fn everything() -> Self {
        Selector::Requirements(Vec::new())
    }

    /// Conjunctive equality selector over the given pairs
    pub fn from_labels(labels: &Labels) -> Result<Self, SelectorError> {
        let requirements = labels
            .iter()
            .map(|(k, v)| Requirement::new(k, Operator::In, [v.as_str()]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Selector::Requirements(requirements))
    }

    /// Convert an API label selector
    pub fn from_label_selector(selector: Option<&LabelSelector>) -> Result<Self, SelectorError> {
        let Some(selector) = selector else {
            return Ok(Selector::Nothing);
        };

        let mut requirements = Vec::new();

        if let Some(match_labels) = &selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::new(key, Operator::In, [value.as_str()])?);
            }
        }

        if let Some(expressions) = &selector.match_expressions {
            for expr in expressions {
                requirements.push(requirement_from_expression(expr)?);
            }
        }

        Ok(Selector::Requirements(requirements))
    }

    /// Parse the `k=v,k2=v2` form used on the command line and in query strings
    ///
    /// Also accepts `k!=v`, bare `k` (exists) and `!k` (does not exist).
    pub fn parse(s: &str) -> Result<Self, SelectorError> {
        let mut requirements = Vec::new();

        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                Requirement::new(k.trim(), Operator::NotIn, [v.trim()])?
            } else if let Some((k, v)) = term.split_once('=') {
                let v = v.strip_prefix('=').unwrap_or(v);
                Requirement::new(k.trim(), Operator::In, [v.trim()])?
            } else if let Some(k) = term.strip_prefix('!') {
                Requirement::new(k.trim(), Operator::DoesNotExist, Vec::<String>::new())?
            } else {
                Requirement::new(term, Operator::Exists, Vec::<String>::new())?
            };
            requirements.push(requirement);
        }

        Ok(Selector::Requirements(requirements))
    }

    /// Test the selector against a label set
    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Selector::Nothing => false,
            Selector::Requirements(reqs) => reqs.iter().all(|r| r.matches(labels)),
        }
    }

    /// Returns true if this selector matches every label set
    pub fn is_everything(&self) -> bool {
        matches!(self, Selector::Requirements(reqs) if reqs.is_empty())
    }
}

fn requirement_from_expression(
    expr: &LabelSelectorRequirement,
) -> Result<Requirement, SelectorError> {
    let operator =
        Operator::parse(&expr.operator).ok_or_else(|| SelectorError::UnknownOperator {
            key: expr.key.clone(),
            operator: expr.operator.clone(),
        })?;
    let values = expr.values.clone().unwrap_or_default();
    Requirement::new(&expr.key, operator, values)
}

/// Validate a qualified label key: `[prefix/]name`
fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason| SelectorError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
            return Err(invalid("prefix must be 1-253 characters"));
        }
        if !is_dns_subdomain(prefix) {
            return Err(invalid("prefix must be a lowercase DNS subdomain"));
        }
    }

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if !is_qualified_name_part(name) {
        return Err(invalid(
            "name must be at most 63 alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric",
        ));
    }

    Ok(())
}

/// Label values may be empty; otherwise they follow the name rules
fn is_valid_value(value: &str) -> bool {
    value.is_empty() || is_qualified_name_part(value)
}

fn is_qualified_name_part(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            s.len() <= MAX_NAME_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                label.len() <= MAX_NAME_LEN
                    && (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn match_labels(pairs: &[(&str, &str)]) -> LabelSelector {
        LabelSelector {
            match_labels: Some(labels(pairs)),
            match_expressions: None,
        }
    }

    fn expr(key: &str, op: &str, values: Vec<&str>) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: op.to_string(),
            values: Some(values.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_match_labels_conjunction() {
        let selector = Selector::from_label_selector(Some(&match_labels(&[
            ("zone", "a"),
            ("pool", "batch"),
        ])))
        .unwrap();

        assert!(selector.matches(&labels(&[("zone", "a"), ("pool", "batch"), ("x", "y")])));
        assert!(!selector.matches(&labels(&[("zone", "a")])));
        assert!(!selector.matches(&labels(&[("zone", "b"), ("pool", "batch")])));
    }

    #[test]
    fn test_absent_selector_matches_nothing() {
        let selector = Selector::from_label_selector(None).unwrap();
        assert_eq!(selector, Selector::Nothing);
        assert!(!selector.matches(&Labels::new()));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = Selector::from_label_selector(Some(&LabelSelector::default())).unwrap();
        assert!(selector.is_everything());
        assert!(selector.matches(&labels(&[("any", "thing")])));
    }

    #[test]
    fn test_match_expressions() {
        let selector = Selector::from_label_selector(Some(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![
                expr("zone", "In", vec!["a", "b"]),
                expr("tier", "NotIn", vec!["prod"]),
                expr("gpu", "DoesNotExist", vec![]),
                expr("pool", "Exists", vec![]),
            ]),
        }))
        .unwrap();

        assert!(selector.matches(&labels(&[("zone", "b"), ("pool", "x")])));
        assert!(selector.matches(&labels(&[("zone", "a"), ("pool", "x"), ("tier", "dev")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("pool", "x"), ("tier", "prod")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("pool", "x"), ("gpu", "1")])));
        assert!(!selector.matches(&labels(&[("zone", "c"), ("pool", "x")])));
        assert!(!selector.matches(&labels(&[("zone", "a")])));
    }

    #[test]
    fn test_invalid_operator_arity() {
        let err = Selector::from_label_selector(Some(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![expr("zone", "In", vec![])]),
        }))
        .unwrap_err();
        assert!(matches!(err, SelectorError::MissingValues { .. }));

        let err = Selector::from_label_selector(Some(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![expr("zone", "Exists", vec!["a"])]),
        }))
        .unwrap_err();
        assert!(matches!(err, SelectorError::UnexpectedValues { .. }));

        let err = Selector::from_label_selector(Some(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![expr("zone", "Near", vec!["a"])]),
        }))
        .unwrap_err();
        assert!(matches!(err, SelectorError::UnknownOperator { .. }));
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("zone").is_ok());
        assert!(validate_key("topology.kubernetes.io/zone").is_ok());
        assert!(validate_key("node-role.kubernetes.io/worker").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/zone").is_err());
        assert!(validate_key("Example.COM/zone").is_err());
        assert!(validate_key("-zone").is_err());
        assert!(validate_key("zone_").is_err());
        assert!(validate_key(&"k".repeat(64)).is_err());
        assert!(validate_key("a/b/c").is_err());
    }

    #[test]
    fn test_value_validation() {
        assert!(is_valid_value(""));
        assert!(is_valid_value("us-east-1a"));
        assert!(!is_valid_value("has space"));
        assert!(!is_valid_value(".leading"));

        let err =
            Selector::from_label_selector(Some(&match_labels(&[("zone", "bad value")]))).unwrap_err();
        assert!(matches!(err, SelectorError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_query_form() {
        let selector = Selector::parse("zone=a, tier!=prod,pool,!gpu").unwrap();
        assert!(selector.matches(&labels(&[("zone", "a"), ("pool", "x")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("pool", "x"), ("gpu", "1")])));
        assert!(!selector.matches(&labels(&[("zone", "a"), ("pool", "x"), ("tier", "prod")])));

        let selector = Selector::parse("zone==a").unwrap();
        assert!(selector.matches(&labels(&[("zone", "a")])));

        assert!(Selector::parse("").unwrap().is_everything());
        assert!(Selector::parse("bad key=a").is_err());
    }
}
