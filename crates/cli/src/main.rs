//! Pod Responder CLI
//!
//! A command-line tool for exercising and inspecting a running
//! pod responder.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alert, status};

/// Pod Responder CLI
#[derive(Parser)]
#[command(name = "prctl")]
#[command(author, version, about = "CLI for the Pod Responder", long_about = None)]
pub struct Cli {
    /// Responder base URL (can also be set via PRCTL_URL env var)
    #[arg(long, env = "PRCTL_URL")]
    pub url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a synthetic Falco alert naming a pod to delete
    Send {
        /// Namespace of the pod
        #[arg(long, short)]
        namespace: String,

        /// Pod to delete
        #[arg(long, short)]
        pod: String,

        /// Falco rule name to report
        #[arg(long, default_value = "Synthetic alert from prctl")]
        rule: String,

        /// Falco priority label
        #[arg(long, default_value = "Warning")]
        priority: String,

        /// Route the responder accepts alerts on
        #[arg(long)]
        alert_path: Option<String>,
    },

    /// Show responder health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let client = client::ApiClient::new(&config.resolve_url(cli.url))?;

    match cli.command {
        Commands::Send {
            namespace,
            pod,
            rule,
            priority,
            alert_path,
        } => {
            let synthetic = alert::SyntheticAlert {
                namespace,
                pod,
                rule,
                priority,
            };
            let path = config.resolve_alert_path(alert_path);
            alert::send_alert(&client, &path, &synthetic, cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
