//! Commands that work on a config document without an agent

use anyhow::{Context, Result};
use colored::Colorize;
use colocation::loader;
use colocation::validation::{validate_node_config, validate_strategy};
use colocation::{try_resolve_labels, ColocationConfig, ColocationStrategy, Labels, NodeColocationConfig, Selector};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_status, format_labels, format_matched_group, print_error, print_json, print_rows,
    print_success, print_warning, strategy_rows, OutputFormat,
};

/// Verdict on one override entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideReport {
    pub index: usize,
    pub selector: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verdict on a whole document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// False when the default strategy is invalid and the document would be rejected
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_error: Option<String>,
    pub overrides: Vec<OverrideReport>,
}

impl ValidationReport {
    pub fn invalid_overrides(&self) -> usize {
        self.overrides.iter().filter(|o| !o.valid).count()
    }
}

/// Strategy resolved offline for a label set
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub labels: Labels,
    pub strategy: ColocationStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_group: Option<usize>,
}

#[derive(Tabled)]
struct OverrideRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Selector")]
    selector: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn read_document(file: &Path) -> Result<ColocationConfig> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    loader::parse(&bytes).with_context(|| format!("Failed to parse {}", file.display()))
}

fn describe_selector(node_config: &NodeColocationConfig) -> String {
    let Some(selector) = &node_config.node_selector else {
        return "<none>".to_string();
    };

    let mut parts = Vec::new();
    if let Some(match_labels) = &selector.match_labels {
        parts.extend(match_labels.iter().map(|(k, v)| format!("{}={}", k, v)));
    }
    if let Some(expressions) = &selector.match_expressions {
        parts.extend(expressions.iter().map(|e| {
            format!(
                "{} {} ({})",
                e.key,
                e.operator,
                e.values.as_deref().unwrap_or_default().join(",")
            )
        }));
    }

    if parts.is_empty() {
        "{}".to_string()
    } else {
        parts.join(",")
    }
}

/// Check every part of a document
pub fn validation_report(config: &ColocationConfig) -> ValidationReport {
    let default_error = validate_strategy(Some(&config.strategy))
        .err()
        .map(|e| e.to_string());

    let overrides = config
        .node_configs
        .iter()
        .enumerate()
        .map(|(index, node_config)| {
            let reason = validate_node_config(Some(node_config))
                .err()
                .map(|e| e.to_string());
            OverrideReport {
                index,
                selector: describe_selector(node_config),
                valid: reason.is_none(),
                reason,
            }
        })
        .collect();

    ValidationReport {
        valid: default_error.is_none(),
        default_error,
        overrides,
    }
}

/// Validate a document; returns false when it would be rejected
pub fn validate(file: &Path, format: OutputFormat) -> Result<bool> {
    let config = read_document(file)?;
    let report = validation_report(&config);

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Default Strategy".bold());
            print_rows(strategy_rows(&config.strategy), "");
            match &report.default_error {
                None => print_success("Default strategy is valid"),
                Some(reason) => print_error(&format!("Default strategy is invalid: {}", reason)),
            }
            println!();

            println!("{}", "Node Configs".bold());
            let rows: Vec<OverrideRow> = report
                .overrides
                .iter()
                .map(|o| OverrideRow {
                    index: o.index,
                    selector: o.selector.clone(),
                    status: color_status(if o.valid { "valid" } else { "invalid" }),
                    reason: o.reason.clone().unwrap_or_default(),
                })
                .collect();
            print_rows(rows, "No node configs");

            let dropped = report.invalid_overrides();
            if dropped > 0 {
                print_warning(&format!(
                    "{} of {} node configs would be ignored",
                    dropped,
                    report.overrides.len()
                ));
            }
        }
    }

    Ok(report.valid)
}

/// Parse repeated `key=value` flags into a label set
pub fn parse_labels(pairs: &[String]) -> Result<Labels> {
    let labels = pairs
        .iter()
        .map(|pair| {
            let (k, v) = pair
                .split_once('=')
                .with_context(|| format!("expected key=value, got {:?}", pair))?;
            Ok((k.trim().to_string(), v.trim().to_string()))
        })
        .collect::<Result<Labels>>()?;

    Selector::from_labels(&labels).context("Invalid label")?;
    Ok(labels)
}

/// Resolve a label set against a document
///
/// Override indices refer to positions in the document as written.
pub fn resolve_report(config: &ColocationConfig, labels: Labels) -> Result<ResolveReport> {
    let resolution = try_resolve_labels(Some(config), Some(&labels))
        .context("No strategy can be resolved for these labels")?;

    Ok(ResolveReport {
        labels,
        strategy: resolution.strategy,
        matched_group: resolution.matched_group,
    })
}

pub fn resolve(file: &Path, pairs: &[String], format: OutputFormat) -> Result<()> {
    let config = read_document(file)?;
    let labels = parse_labels(pairs)?;
    let report = resolve_report(&config, labels)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("Labels:  {}", format_labels(&report.labels).cyan());
            println!(
                "Matched: {}",
                format_matched_group(report.matched_group).cyan()
            );
            println!();
            print_rows(strategy_rows(&report.strategy), "");
        }
    }

    Ok(())
}
