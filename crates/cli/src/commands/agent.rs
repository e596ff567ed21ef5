//! Commands that query a running colocation agent

use anyhow::Result;
use colored::Colorize;
use colocation::health::ComponentStatus;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_labels, format_matched_group, format_timestamp, print_info, print_json,
    print_rows, strategy_rows, OutputFormat,
};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Labels")]
    labels: String,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

fn status_name(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

/// Show the strategy the agent resolves for a node
pub async fn get_strategy(client: &ApiClient, node: &str, format: OutputFormat) -> Result<()> {
    let result = client.node_strategy(node).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("Node:       {}", result.node.cyan());
            println!(
                "Matched:    {}",
                format_matched_group(result.matched_group).cyan()
            );
            println!("Generation: {}", result.generation);
            println!();
            print_rows(strategy_rows(&result.strategy), "");
        }
    }

    Ok(())
}

/// List nodes known to the agent
pub async fn get_nodes(
    client: &ApiClient,
    selector: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let nodes = client.nodes(selector).await?;

    match format {
        OutputFormat::Json => print_json(&nodes)?,
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = nodes
                .iter()
                .map(|n| NodeRow {
                    name: n.name.clone(),
                    labels: format_labels(&n.labels),
                })
                .collect();
            print_rows(rows, "No nodes found");
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    health: colocation::HealthResponse,
    readiness: colocation::ReadinessResponse,
    config: colocation::models::ConfigSnapshot,
}

/// Show agent health, readiness and the published config generation
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (health, readiness, config) =
        tokio::try_join!(client.health(), client.readiness(), client.config())?;

    match format {
        OutputFormat::Json => print_json(&StatusReport {
            health,
            readiness,
            config,
        })?,
        OutputFormat::Table => {
            println!("{}", "Agent Status".bold());
            println!("{}", "=".repeat(50));
            println!("Health:      {}", color_status(status_name(health.status)));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness:   {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                print_info(reason);
            }
            println!("Generation:  {}", config.generation);
            println!("Node groups: {}", config.config.node_configs.len());
            println!();

            let mut components: Vec<_> = health.components.into_iter().collect();
            components.sort_by(|a, b| a.0.cmp(&b.0));
            let rows: Vec<ComponentRow> = components
                .into_iter()
                .map(|(name, c)| ComponentRow {
                    name,
                    status: color_status(status_name(c.status)),
                    message: c.message.unwrap_or_default(),
                    last_check: format_timestamp(c.last_check_timestamp),
                })
                .collect();
            print_rows(rows, "No components registered");
        }
    }

    Ok(())
}
