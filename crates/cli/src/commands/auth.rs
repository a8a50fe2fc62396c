//! `smokefleet auth`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use smokefleet_common::HarnessConfig;
use smokefleet_harness::{AuthReport, SmokeRunner};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct AuthArgs {
    /// Services to authenticate (default: the whole fleet)
    pub services: Vec<String>,

    /// Log in again even when a fresh snapshot exists
    #[arg(long)]
    pub force: bool,
}

impl TableDisplay for AuthReport {
    fn headers() -> Vec<&'static str> {
        vec!["Service", "Name", "Session", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let session = match &self.outcome {
            Some(outcome) => format!("{}", outcome.to_string().green()),
            None => format!("{}", "failed".red()),
        };
        vec![
            self.key.clone(),
            self.name.clone(),
            session,
            self.error.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(args: AuthArgs, config: HarnessConfig, format: OutputFormat) -> Result<i32> {
    let auth_dir = config.auth_dir.clone();
    let runner = SmokeRunner::new(config);
    let reports = runner.authenticate(&args.services, args.force).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => {
            output::print_list(&reports, format);
            println!("Snapshots: {}", auth_dir.display());
        }
    }

    Ok(if reports.iter().all(|r| r.error.is_none()) { 0 } else { 1 })
}
