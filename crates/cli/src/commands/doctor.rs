//! `smokefleet doctor`
//!
//! Environment triage: answers "can this machine run the fleet right
//! now", before any browser is launched.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use smokefleet_common::config::DEFAULT_CONFIG_FILE;
use smokefleet_common::{Credentials, HarnessConfig};
use smokefleet_harness::browser;
use smokefleet_harness::SmokeRunner;

use crate::output::OutputFormat;

#[derive(Serialize)]
struct ServiceTriage {
    key: String,
    env_prefix: String,
    url: String,
    url_ok: bool,
    needs_credentials: bool,
    credentials_set: bool,
    skip: bool,
}

#[derive(Serialize)]
struct DoctorReport {
    chromium: Option<PathBuf>,
    env_file: bool,
    config_file: bool,
    services: Vec<ServiceTriage>,
    ok: bool,
}

pub fn execute(config: HarnessConfig, format: OutputFormat) -> Result<i32> {
    let report = triage(config);

    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&report);
    }

    Ok(if report.ok { 0 } else { 1 })
}

fn triage(config: HarnessConfig) -> DoctorReport {
    let chromium = browser::detect_chromium();
    let env_file = Path::new(".env").exists();
    let config_file = Path::new(DEFAULT_CONFIG_FILE).exists();

    let runner = SmokeRunner::new(config);
    let services: Vec<ServiceTriage> = runner
        .fleet()
        .iter()
        .map(|svc| {
            let url = runner
                .resolve_base_url(svc)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| svc.default_url.clone());
            ServiceTriage {
                key: svc.key.clone(),
                env_prefix: svc.env_prefix.clone(),
                url_ok: runner.resolve_base_url(svc).is_ok(),
                url,
                needs_credentials: svc.has_login(),
                credentials_set: Credentials::available(&svc.env_prefix),
                skip: runner.config().skipped(&svc.key),
            }
        })
        .collect();

    // skipped services don't block a run
    let blockers = services
        .iter()
        .filter(|s| !s.skip)
        .any(|s| !s.url_ok || (s.needs_credentials && !s.credentials_set));
    let ok = chromium.is_some() && !blockers;

    DoctorReport { chromium, env_file, config_file, services, ok }
}

fn render(report: &DoctorReport) {
    println!("{}", "Environment".bold());
    match &report.chromium {
        Some(path) => println!("   Chromium: {}", path.display().to_string().green()),
        None => println!(
            "   Chromium: {} (install chromium or set SMOKEFLEET_CHROMIUM)",
            "not found".red()
        ),
    }
    println!(
        "   Env file: {}",
        if report.env_file { ".env".green() } else { "none".dimmed() }
    );
    println!(
        "   Config:   {}",
        if report.config_file { DEFAULT_CONFIG_FILE.green() } else { "built-in defaults".dimmed() }
    );
    println!();

    println!("{}", "Services".bold());
    for svc in &report.services {
        let verdict = if svc.skip {
            format!("{}", "skip".yellow())
        } else if !svc.url_ok {
            format!("{} bad URL", "✗".red())
        } else if svc.needs_credentials && !svc.credentials_set {
            format!(
                "{} {}_USERNAME / {}_PASSWORD not set",
                "✗".red(),
                svc.env_prefix,
                svc.env_prefix
            )
        } else {
            format!("{}", "✓".green())
        };
        println!("   {:<12} {}", svc.key, verdict);
    }
    println!();

    if report.ok {
        println!("{} fleet can run", "✓".green().bold());
    } else {
        println!("{} fleet cannot run yet, fix the items above", "✗".red().bold());
    }
}
