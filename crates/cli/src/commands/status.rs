//! Responder health and readiness

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_warning, OutputFormat};

/// Row for the component table
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

/// Show overall health, readiness and per-component status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "health": health,
                "readiness": readiness,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            let overall = serde_json::to_value(health.status)?;
            println!("{}", "Pod Responder Status".bold());
            println!("{}", "=".repeat(40));
            println!(
                "Health:    {}",
                color_status(overall.as_str().unwrap_or("unknown"))
            );
            println!(
                "Readiness: {}",
                color_status(if readiness.ready { "ready" } else { "not ready" })
            );
            if let Some(reason) = &readiness.reason {
                print_warning(reason);
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| {
                    let status = serde_json::to_value(component.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    ComponentRow {
                        name: name.clone(),
                        status: color_status(&status),
                        message: component.message.clone().unwrap_or_default(),
                        last_check: format_timestamp(component.last_check_timestamp),
                    }
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
