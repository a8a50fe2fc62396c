//! `smokefleet run`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use smokefleet_common::{HarnessConfig, SessionMode};
use smokefleet_harness::report::{CheckKind, CheckStatus, SuiteReport};
use smokefleet_harness::{RunOptions, SmokeRunner};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Services to check (default: the whole fleet)
    pub services: Vec<String>,

    /// Retry a failed check up to N extra times
    #[arg(long)]
    pub retries: Option<u32>,

    /// Check up to N services concurrently
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Directory holding session snapshots
    #[arg(long)]
    pub auth_dir: Option<PathBuf>,

    /// Directory for the JSON report and failure screenshots
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Log in again even when a fresh snapshot exists
    #[arg(long)]
    pub force_login: bool,
}

#[derive(Serialize)]
struct CheckRow {
    service: String,
    check: String,
    kind: &'static str,
    session: &'static str,
    status: CheckStatus,
    attempts: u32,
    duration_ms: u64,
}

impl TableDisplay for CheckRow {
    fn headers() -> Vec<&'static str> {
        vec!["Service", "Check", "Kind", "Session", "Status", "Attempts", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            CheckStatus::Passed => format!("{}", "passed".green()),
            CheckStatus::Failed => format!("{}", "failed".red()),
            CheckStatus::Skipped => format!("{}", "skipped".yellow()),
        };
        vec![
            self.service.clone(),
            self.check.clone(),
            self.kind.to_string(),
            self.session.to_string(),
            status,
            self.attempts.to_string(),
            format!("{}ms", self.duration_ms),
        ]
    }
}

pub async fn execute(args: RunArgs, mut config: HarnessConfig, format: OutputFormat) -> Result<i32> {
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(parallel) = args.parallel {
        config.parallelism = parallel;
    }
    if args.headful {
        config.headless = false;
    }
    if let Some(dir) = args.auth_dir {
        config.auth_dir = dir;
    }
    if let Some(dir) = args.artifacts_dir {
        config.artifacts_dir = dir;
    }

    let artifacts_dir = config.artifacts_dir.clone();
    let runner = SmokeRunner::new(config);
    let options = RunOptions { services: args.services, force_login: args.force_login };

    let report = runner.run(&options).await?;
    let report_path = report.write_json(&artifacts_dir)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            let rows = check_rows(&report);
            output::print_list(&rows, format);
            print_summary(&report);
            println!("Report: {}", report_path.display());
        }
    }

    Ok(if report.passed() { 0 } else { 1 })
}

fn check_rows(report: &SuiteReport) -> Vec<CheckRow> {
    let mut rows = Vec::new();
    for svc in &report.services {
        for check in &svc.checks {
            rows.push(CheckRow {
                service: svc.key.clone(),
                check: check.name.clone(),
                kind: match check.kind {
                    CheckKind::Browser => "browser",
                    CheckKind::Http => "http",
                },
                session: match check.session {
                    Some(SessionMode::Fresh) => "fresh",
                    Some(SessionMode::Authenticated) => "authenticated",
                    None => "-",
                },
                status: check.status,
                attempts: check.attempts,
                duration_ms: check.duration_ms,
            });
        }
    }
    rows
}

fn print_summary(report: &SuiteReport) {
    let totals = &report.totals;
    let verdict = if report.passed() {
        format!("{}", "PASS".green().bold())
    } else {
        format!("{}", "FAIL".red().bold())
    };

    println!();
    println!("{} {}", verdict, format!("({} ms)", report.duration_ms).dimmed());
    println!(
        "   Services: {} checked, {} passed",
        totals.services,
        report.services.iter().filter(|s| s.passed).count()
    );
    println!(
        "   Checks:   {} passed, {} failed, {} skipped",
        totals.passed.to_string().green(),
        totals.failed.to_string().red(),
        totals.skipped.to_string().yellow()
    );

    for svc in report.services.iter().filter(|s| !s.passed) {
        let reason = svc
            .error
            .clone()
            .or_else(|| {
                svc.checks
                    .iter()
                    .find(|c| c.status == CheckStatus::Failed)
                    .and_then(|c| c.error.clone())
            })
            .unwrap_or_else(|| "checks failed".to_string());
        println!("   {} {}: {}", "✗".red(), svc.key, reason);
    }
    println!();
}
