//! Run reports: per-check, per-service and suite-level results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use smokefleet_common::{Check, SessionMode};

use crate::bootstrap::BootstrapOutcome;
use crate::error::HarnessResult;
use crate::executor::StepOutcome;
use crate::probe::ProbeOutcome;

pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Browser,
    Http,
}

/// Result of one smoke check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub kind: CheckKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionMode>,
    pub status: CheckStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    /// Step outcomes of the last attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl CheckReport {
    pub fn kind_of(check: &Check) -> CheckKind {
        match check {
            Check::Browser { .. } => CheckKind::Browser,
            Check::Http { .. } => CheckKind::Http,
        }
    }

    /// Report entry for a check that never ran
    pub fn skipped(check: &Check, reason: &str) -> Self {
        CheckReport {
            name: check.name().to_string(),
            kind: Self::kind_of(check),
            session: check.session(),
            status: CheckStatus::Skipped,
            attempts: 0,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(reason.to_string()),
            screenshot: None,
        }
    }
}

/// Result of one service's probe, bootstrap and checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
    pub key: String,
    pub name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapOutcome>,
    pub checks: Vec<CheckReport>,
    pub passed: bool,
    pub duration_ms: u64,
    /// Failure outside any single check: bad URL, missing credentials,
    /// unreachable service, browser launch failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub totals: Totals,
    pub services: Vec<ServiceReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub services: usize,
    pub checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteReport {
    pub fn new(services: Vec<ServiceReport>, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        let totals = compute_totals(&services);
        SuiteReport { run_id: Uuid::new_v4(), started_at, duration_ms, totals, services }
    }

    /// A run passes when every service passed; skipped checks do not
    /// fail a run, service-level errors do
    pub fn passed(&self) -> bool {
        self.services.iter().all(|s| s.passed)
    }

    /// Write the JSON report into the artifacts directory
    pub fn write_json(&self, dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

fn compute_totals(services: &[ServiceReport]) -> Totals {
    let mut totals = Totals { services: services.len(), ..Totals::default() };
    for service in services {
        for check in &service.checks {
            totals.checks += 1;
            match check.status {
                CheckStatus::Passed => totals.passed += 1,
                CheckStatus::Failed => totals.failed += 1,
                CheckStatus::Skipped => totals.skipped += 1,
            }
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: CheckStatus) -> CheckReport {
        CheckReport {
            name: "login page loads".to_string(),
            kind: CheckKind::Browser,
            session: Some(SessionMode::Fresh),
            status,
            attempts: 1,
            duration_ms: 120,
            steps: Vec::new(),
            error: None,
            screenshot: None,
        }
    }

    fn service(key: &str, passed: bool, checks: Vec<CheckReport>) -> ServiceReport {
        ServiceReport {
            key: key.to_string(),
            name: key.to_string(),
            base_url: format!("https://{}.example.net/", key),
            probe: None,
            bootstrap: None,
            checks,
            passed,
            duration_ms: 900,
            error: None,
        }
    }

    #[test]
    fn test_totals() {
        let services = vec![
            service(
                "jellyfin",
                true,
                vec![check(CheckStatus::Passed), check(CheckStatus::Passed)],
            ),
            service(
                "navidrome",
                false,
                vec![check(CheckStatus::Failed), check(CheckStatus::Skipped)],
            ),
        ];
        let report = SuiteReport::new(services, Utc::now(), 1500);

        assert_eq!(report.totals.services, 2);
        assert_eq!(report.totals.checks, 4);
        assert_eq!(report.totals.passed, 2);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.totals.skipped, 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_skipped_checks_do_not_fail_a_passing_service() {
        let services =
            vec![service("sabnzbd", true, vec![check(CheckStatus::Passed), check(CheckStatus::Skipped)])];
        let report = SuiteReport::new(services, Utc::now(), 100);
        assert!(report.passed());
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            SuiteReport::new(vec![service("grafana", true, vec![check(CheckStatus::Passed)])], Utc::now(), 42);

        let path = report.write_json(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE);

        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: SuiteReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.totals.checks, 1);
        assert_eq!(parsed.services[0].key, "grafana");
        // empty optionals stay out of the artifact
        assert!(!raw.contains("screenshot"));
    }

    #[test]
    fn test_skipped_entry_from_check() {
        let check = Check::Http {
            name: "api health".to_string(),
            path: "/api/health".to_string(),
            expect_status: 200,
            expect_json: None,
        };
        let entry = CheckReport::skipped(&check, "service unreachable");
        assert_eq!(entry.status, CheckStatus::Skipped);
        assert_eq!(entry.kind, CheckKind::Http);
        assert_eq!(entry.session, None);
        assert_eq!(entry.error.as_deref(), Some("service unreachable"));
    }
}
