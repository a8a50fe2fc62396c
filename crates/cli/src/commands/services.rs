//! `smokefleet services`

use anyhow::Result;
use serde::Serialize;

use smokefleet_common::HarnessConfig;
use smokefleet_harness::SmokeRunner;

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Serialize)]
struct ServiceRow {
    key: String,
    name: String,
    url: String,
    env_prefix: String,
    login: bool,
    checks: usize,
    skip: bool,
}

impl TableDisplay for ServiceRow {
    fn headers() -> Vec<&'static str> {
        vec!["Key", "Name", "URL", "Env Prefix", "Login", "Checks", "Skip"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.name.clone(),
            self.url.clone(),
            self.env_prefix.clone(),
            if self.login { "yes".to_string() } else { "no".to_string() },
            self.checks.to_string(),
            if self.skip { "yes".to_string() } else { String::new() },
        ]
    }
}

pub fn execute(config: HarnessConfig, format: OutputFormat) -> Result<i32> {
    let runner = SmokeRunner::new(config);

    let rows: Vec<ServiceRow> = runner
        .fleet()
        .iter()
        .map(|svc| ServiceRow {
            key: svc.key.clone(),
            name: svc.name.clone(),
            url: runner
                .resolve_base_url(svc)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| svc.default_url.clone()),
            env_prefix: svc.env_prefix.clone(),
            login: svc.has_login(),
            checks: svc.checks.len(),
            skip: runner.config().skipped(&svc.key),
        })
        .collect();

    output::print_list(&rows, format);
    Ok(0)
}
