//! Send a synthetic Falco alert to the responder

use anyhow::{bail, Result};
use responder_lib::{Alert, OutputFields};

use crate::client::ApiClient;
use crate::output::{print_error, print_success, OutputFormat};

/// Fields of the synthetic alert
#[derive(Debug, Clone)]
pub struct SyntheticAlert {
    pub namespace: String,
    pub pod: String,
    pub rule: String,
    pub priority: String,
}

impl SyntheticAlert {
    /// Build a Falco-shaped alert stamped with the current time
    pub fn to_alert(&self) -> Alert {
        let now = chrono::Utc::now();
        Alert {
            output: Some(format!(
                "{} {}: synthetic alert from prctl (k8s.ns={} k8s.pod={})",
                now.format("%H:%M:%S%.9f"),
                self.priority,
                self.namespace,
                self.pod
            )),
            priority: Some(self.priority.clone()),
            rule: Some(self.rule.clone()),
            time: Some(now.to_rfc3339()),
            output_fields: Some(OutputFields {
                evt_time: now.timestamp_nanos_opt(),
                k8s_ns_name: Some(self.namespace.clone()),
                k8s_pod_name: Some(self.pod.clone()),
                proc_cmdline: Some("prctl send".to_string()),
                ..Default::default()
            }),
        }
    }
}

/// Post the alert and report the responder's verdict
pub async fn send_alert(
    client: &ApiClient,
    alert_path: &str,
    synthetic: &SyntheticAlert,
    format: OutputFormat,
) -> Result<()> {
    let reply = client.post_alert(alert_path, &synthetic.to_alert()).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "status": reply.status.as_u16(),
                "message": reply.message,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            if reply.status.is_success() {
                print_success(&reply.message);
            } else {
                print_error(&format!("{} {}", reply.status, reply.message));
            }
        }
    }

    if !reply.status.is_success() {
        bail!("responder returned {}", reply.status);
    }
    Ok(())
}
