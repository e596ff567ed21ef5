//! Output formatting utilities

use clap::ValueEnum;
use colocation::strategy::fields;
use colocation::{ColocationStrategy, Labels};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a rounded table, or a notice when there are no rows
pub fn print_rows<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Row of a strategy table
#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn show<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".dimmed().to_string())
}

/// One row per strategy field; unset fields show as `-`
pub fn strategy_rows(strategy: &ColocationStrategy) -> Vec<FieldRow> {
    vec![
        FieldRow {
            field: fields::ENABLE,
            value: color_enabled(strategy.enable),
        },
        FieldRow {
            field: fields::CPU_RECLAIM_THRESHOLD_PERCENT,
            value: show(strategy.cpu_reclaim_threshold_percent),
        },
        FieldRow {
            field: fields::MEMORY_RECLAIM_THRESHOLD_PERCENT,
            value: show(strategy.memory_reclaim_threshold_percent),
        },
        FieldRow {
            field: fields::DEGRADE_TIME_MINUTES,
            value: show(strategy.degrade_time_minutes),
        },
        FieldRow {
            field: fields::UPDATE_TIME_THRESHOLD_SECONDS,
            value: show(strategy.update_time_threshold_seconds),
        },
        FieldRow {
            field: fields::RESOURCE_DIFF_THRESHOLD,
            value: show(strategy.resource_diff_threshold),
        },
    ]
}

/// Human-readable name of the override that applied
pub fn format_matched_group(matched_group: Option<usize>) -> String {
    match matched_group {
        Some(index) => format!("nodeConfigs[{}]", index),
        None => "default".to_string(),
    }
}

/// `k=v,k2=v2`
pub fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return "<none>".to_string();
    }
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn color_enabled(enable: Option<bool>) -> String {
    match enable {
        Some(true) => "true".green().to_string(),
        Some(false) => "false".red().to_string(),
        None => "-".dimmed().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" | "valid" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" | "invalid" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Format a unix timestamp as RFC 3339
pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
