//! `smokefleet probe`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use smokefleet_common::HarnessConfig;
use smokefleet_harness::{ProbeReport, SmokeRunner};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ProbeArgs {
    /// Services to probe (default: the whole fleet)
    pub services: Vec<String>,
}

impl TableDisplay for ProbeReport {
    fn headers() -> Vec<&'static str> {
        vec!["Service", "URL", "Reachable", "Status", "Attempts", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let reachable = if self.probe.reachable {
            format!("{}", "✓".green())
        } else {
            format!("{}", "✗".red())
        };
        vec![
            self.key.clone(),
            self.url.clone(),
            reachable,
            self.probe.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            self.probe.attempts.to_string(),
            format!("{}ms", self.probe.duration_ms),
        ]
    }
}

pub async fn execute(args: ProbeArgs, config: HarnessConfig, format: OutputFormat) -> Result<i32> {
    let runner = SmokeRunner::new(config);
    let reports = runner.probe_fleet(&args.services).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => output::print_list(&reports, format),
    }

    Ok(if reports.iter().all(|r| r.probe.reachable) { 0 } else { 1 })
}
