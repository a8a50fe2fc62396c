//! Fleet orchestration
//!
//! One service at a time (or N with `parallelism`): resolve the base URL,
//! probe reachability, launch a dedicated Chromium, run the fresh checks,
//! bootstrap the session, then run the authenticated and HTTP checks.
//! Checks run in their declared order; the session bootstrap happens
//! lazily before the first authenticated check so fresh checks always see
//! a cookie-free browser.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use smokefleet_common::{
    credentials, Check, Credentials, HarnessConfig, ServiceSpec, SessionMode, SnapshotStore, Step,
};

use crate::bootstrap::{self, BootstrapOutcome, Bootstrapper};
use crate::browser::{self, BrowserSession, LaunchSpec};
use crate::error::{HarnessError, HarnessResult};
use crate::executor::{self, ExecContext, StepOutcome};
use crate::fleet;
use crate::probe::{ProbeOutcome, Prober};
use crate::report::{CheckKind, CheckReport, CheckStatus, ServiceReport, SuiteReport};

/// Default budget for polling assertions, matching the per-step default
const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Options for one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Service keys to check; empty means the whole fleet minus skips
    pub services: Vec<String>,
    /// Re-authenticate even when a fresh snapshot exists
    pub force_login: bool,
}

/// Result of `authenticate` for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthReport {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<BootstrapOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `probe_fleet` for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub key: String,
    pub name: String,
    pub url: String,
    pub probe: ProbeOutcome,
}

/// Runs smoke checks across the fleet
pub struct SmokeRunner {
    config: HarnessConfig,
    fleet: Vec<ServiceSpec>,
}

impl SmokeRunner {
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_fleet(config, fleet::builtin())
    }

    pub fn with_fleet(config: HarnessConfig, fleet: Vec<ServiceSpec>) -> Self {
        Self { config, fleet }
    }

    pub fn fleet(&self) -> &[ServiceSpec] {
        &self.fleet
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Resolve service keys to specs. An empty selection means the whole
    /// fleet minus configured skips; naming a service explicitly always
    /// includes it, skip or not.
    pub fn select(&self, keys: &[String]) -> HarnessResult<Vec<&ServiceSpec>> {
        if keys.is_empty() {
            return Ok(self.fleet.iter().filter(|s| !self.config.skipped(&s.key)).collect());
        }
        let mut picked = Vec::with_capacity(keys.len());
        for key in keys {
            let spec = self
                .fleet
                .iter()
                .find(|s| s.key == *key)
                .ok_or_else(|| smokefleet_common::Error::UnknownService(key.clone()))?;
            picked.push(spec);
        }
        Ok(picked)
    }

    /// Base URL precedence: `{PREFIX}_URL`, then the config file, then
    /// the built-in default
    pub fn resolve_base_url(&self, svc: &ServiceSpec) -> HarnessResult<Url> {
        let raw = credentials::url_from_env(&svc.env_prefix)
            .or_else(|| self.config.url_override(&svc.key).map(String::from))
            .unwrap_or_else(|| svc.default_url.clone());
        Url::parse(&raw).map_err(|_| {
            HarnessError::from(smokefleet_common::Error::InvalidUrl {
                service: svc.key.clone(),
                url: raw,
            })
        })
    }

    /// Run the selected checks and produce a suite report
    pub async fn run(&self, options: &RunOptions) -> HarnessResult<SuiteReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let selected = self.select(&options.services)?;
        if selected.is_empty() {
            return Err(smokefleet_common::Error::InvalidConfig(
                "no services selected; every service is marked skip".to_string(),
            )
            .into());
        }

        info!("Checking {} service(s)...", selected.len());
        let prober = Prober::new(self.config.probe_window(), self.config.ignore_https_errors)?;

        let services: Vec<ServiceReport> = stream::iter(selected)
            .map(|svc| self.run_service(svc, &prober, options.force_login))
            .buffered(self.config.parallelism.max(1))
            .collect()
            .await;

        let report = SuiteReport::new(services, started_at, start.elapsed().as_millis() as u64);

        info!("");
        info!(
            "Fleet results: {} passed, {} failed, {} skipped across {} service(s) ({} ms)",
            report.totals.passed,
            report.totals.failed,
            report.totals.skipped,
            report.totals.services,
            report.duration_ms
        );
        Ok(report)
    }

    /// Probe every selected service without opening a browser
    pub async fn probe_fleet(&self, keys: &[String]) -> HarnessResult<Vec<ProbeReport>> {
        let selected = self.select(keys)?;
        let prober = Prober::new(self.config.probe_window(), self.config.ignore_https_errors)?;
        let mut reports = Vec::with_capacity(selected.len());
        for svc in selected {
            match self.resolve_base_url(svc) {
                Ok(base) => {
                    let probe = prober.probe(&base).await;
                    if probe.reachable {
                        info!("✓ {} ({})", svc.key, base);
                    } else {
                        error!("✗ {} ({})", svc.key, base);
                    }
                    reports.push(ProbeReport {
                        key: svc.key.clone(),
                        name: svc.name.clone(),
                        url: base.to_string(),
                        probe,
                    });
                }
                Err(e) => {
                    error!("✗ {}: {}", svc.key, e);
                    reports.push(ProbeReport {
                        key: svc.key.clone(),
                        name: svc.name.clone(),
                        url: svc.default_url.clone(),
                        probe: ProbeOutcome {
                            reachable: false,
                            attempts: 0,
                            status: None,
                            error: Some(e.to_string()),
                            duration_ms: 0,
                        },
                    });
                }
            }
        }
        Ok(reports)
    }

    /// Capture (or refresh) session snapshots without running checks
    pub async fn authenticate(&self, keys: &[String], force: bool) -> HarnessResult<Vec<AuthReport>> {
        let selected = self.select(keys)?;
        let prober = Prober::new(self.config.probe_window(), self.config.ignore_https_errors)?;
        let store = SnapshotStore::new(&self.config.auth_dir);
        let bootstrapper = Bootstrapper::new(
            &store,
            self.config.snapshot_max_age(),
            self.config.nav_timeout(),
            DEFAULT_WAIT,
        );

        let mut reports = Vec::with_capacity(selected.len());
        for svc in selected {
            match self.authenticate_service(svc, &prober, &bootstrapper, force).await {
                Ok(outcome) => {
                    info!("✓ {}: session {}", svc.key, outcome);
                    reports.push(AuthReport {
                        key: svc.key.clone(),
                        name: svc.name.clone(),
                        outcome: Some(outcome),
                        error: None,
                    });
                }
                Err(e) => {
                    error!("✗ {}: {}", svc.key, e);
                    reports.push(AuthReport {
                        key: svc.key.clone(),
                        name: svc.name.clone(),
                        outcome: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(reports)
    }

    async fn authenticate_service(
        &self,
        svc: &ServiceSpec,
        prober: &Prober,
        bootstrapper: &Bootstrapper<'_>,
        force: bool,
    ) -> HarnessResult<BootstrapOutcome> {
        let base = self.resolve_base_url(svc)?;
        let probe = prober.probe(&base).await;
        if !probe.reachable {
            return Err(HarnessError::Unreachable {
                service: svc.key.clone(),
                attempts: probe.attempts,
                reason: probe.error.unwrap_or_else(|| "no response".to_string()),
            });
        }
        let credentials = if svc.has_login() {
            Some(Credentials::from_env(&svc.env_prefix).map_err(HarnessError::from)?)
        } else {
            None
        };

        let session = BrowserSession::launch(&self.launch_spec()).await?;
        let result = bootstrapper.ensure(&session, svc, &base, credentials.as_ref(), force).await;
        if let Err(e) = session.close().await {
            debug!("{}: browser close: {}", svc.key, e);
        }
        result
    }

    fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            headless: self.config.headless,
            ignore_https_errors: self.config.ignore_https_errors,
            ..LaunchSpec::default()
        }
    }

    async fn run_service(
        &self,
        svc: &ServiceSpec,
        prober: &Prober,
        force_login: bool,
    ) -> ServiceReport {
        let start = Instant::now();
        debug!("checking {}", svc.key);

        let base = match self.resolve_base_url(svc) {
            Ok(base) => base,
            Err(e) => {
                error!("✗ {}: {}", svc.key, e);
                return self.errored(svc, svc.default_url.clone(), None, e.to_string(), start);
            }
        };
        info!("{} ({})", svc.name, base);

        let probe = prober.probe(&base).await;
        if !probe.reachable {
            error!("✗ {}: unreachable, skipping checks", svc.key);
            return self.errored(
                svc,
                base.to_string(),
                Some(probe),
                "service unreachable".to_string(),
                start,
            );
        }

        let credentials = if svc.has_login() {
            match Credentials::from_env(&svc.env_prefix) {
                Ok(creds) => Some(creds),
                Err(e) => {
                    error!("✗ {}: {}", svc.key, e);
                    return self.errored(svc, base.to_string(), Some(probe), e.to_string(), start);
                }
            }
        } else {
            None
        };

        let session = match BrowserSession::launch(&self.launch_spec()).await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {}: {}", svc.key, e);
                return self.errored(
                    svc,
                    base.to_string(),
                    Some(probe),
                    format!("browser launch failed: {}", e),
                    start,
                );
            }
        };

        let store = SnapshotStore::new(&self.config.auth_dir);
        let bootstrapper = Bootstrapper::new(
            &store,
            self.config.snapshot_max_age(),
            self.config.nav_timeout(),
            DEFAULT_WAIT,
        );

        let mut bootstrap: Option<BootstrapOutcome> = None;
        let mut bootstrap_error: Option<String> = None;
        let mut healed = false;
        let mut checks = Vec::with_capacity(svc.checks.len());

        for check in &svc.checks {
            match check {
                Check::Http { name, path, expect_status, expect_json } => {
                    checks.push(
                        self.run_http_check(
                            prober,
                            &base,
                            name,
                            path,
                            *expect_status,
                            expect_json.as_ref(),
                        )
                        .await,
                    );
                }
                Check::Browser { name, session: mode, steps } => {
                    if *mode == SessionMode::Authenticated {
                        if bootstrap_error.is_some() {
                            info!("- {} (skipped)", name);
                            checks.push(CheckReport::skipped(check, "session bootstrap failed"));
                            continue;
                        }
                        if bootstrap.is_none() {
                            match bootstrapper
                                .ensure(&session, svc, &base, credentials.as_ref(), force_login)
                                .await
                            {
                                Ok(outcome) => {
                                    info!("{}: session {}", svc.key, outcome);
                                    bootstrap = Some(outcome);
                                }
                                Err(e) => {
                                    error!("✗ {}: {}", svc.key, e);
                                    bootstrap_error = Some(e.to_string());
                                    checks.push(
                                        CheckReport::skipped(check, "session bootstrap failed"),
                                    );
                                    continue;
                                }
                            }
                        }
                    } else if bootstrap.is_some() {
                        // fleet definitions order fresh checks first; a
                        // fresh page after a restore shares cookies
                        warn!("{}: fresh check '{}' after session bootstrap", svc.key, name);
                    }
                    checks.push(
                        self.run_browser_check(
                            &session,
                            &bootstrapper,
                            &store,
                            svc,
                            &base,
                            credentials.as_ref(),
                            name,
                            *mode,
                            steps,
                            &mut bootstrap,
                            &mut healed,
                        )
                        .await,
                    );
                }
            }
        }

        if let Err(e) = session.close().await {
            debug!("{}: browser close: {}", svc.key, e);
        }

        let passed =
            bootstrap_error.is_none() && checks.iter().all(|c| c.status != CheckStatus::Failed);
        ServiceReport {
            key: svc.key.clone(),
            name: svc.name.clone(),
            base_url: base.to_string(),
            probe: Some(probe),
            bootstrap,
            checks,
            passed,
            duration_ms: start.elapsed().as_millis() as u64,
            error: bootstrap_error,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_browser_check(
        &self,
        session: &BrowserSession,
        bootstrapper: &Bootstrapper<'_>,
        store: &SnapshotStore,
        svc: &ServiceSpec,
        base: &Url,
        credentials: Option<&Credentials>,
        name: &str,
        mode: SessionMode,
        steps: &[Step],
        bootstrap: &mut Option<BootstrapOutcome>,
        healed: &mut bool,
    ) -> CheckReport {
        let start = Instant::now();
        let max_attempts = self.config.retries + 1;
        let mut attempt: u32 = 0;
        let mut last = AttemptOutcome::default();

        while attempt < max_attempts {
            attempt += 1;
            last = self
                .attempt_browser_check(session, svc, base, credentials, store, mode, steps, name, attempt)
                .await;
            if last.error.is_none() {
                break;
            }

            // a dead reused session gets one re-login before retrying
            if mode == SessionMode::Authenticated
                && *bootstrap == Some(BootstrapOutcome::Reused)
                && !*healed
            {
                *healed = true;
                warn!(
                    "{}: authenticated check failed on a reused session, re-authenticating",
                    svc.key
                );
                let _ = bootstrapper.invalidate(&svc.key);
                match bootstrapper.ensure(session, svc, base, credentials, true).await {
                    Ok(_) => {
                        *bootstrap = Some(BootstrapOutcome::Refreshed);
                        attempt -= 1;
                        continue;
                    }
                    Err(e) => {
                        error!("{}: re-authentication failed: {}", svc.key, e);
                        last.error = Some(format!("re-authentication failed: {}", e));
                        break;
                    }
                }
            }

            if attempt < max_attempts {
                warn!("{}: retrying '{}' ({}/{})", svc.key, name, attempt + 1, max_attempts);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = if last.error.is_none() { CheckStatus::Passed } else { CheckStatus::Failed };
        match status {
            CheckStatus::Passed => info!("✓ {} ({} ms)", name, duration_ms),
            _ => error!("✗ {} - {}", name, last.error.as_deref().unwrap_or("unknown error")),
        }

        CheckReport {
            name: name.to_string(),
            kind: CheckKind::Browser,
            session: Some(mode),
            status,
            attempts: attempt,
            duration_ms,
            steps: last.steps,
            error: last.error,
            screenshot: last.screenshot,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_browser_check(
        &self,
        session: &BrowserSession,
        svc: &ServiceSpec,
        base: &Url,
        credentials: Option<&Credentials>,
        store: &SnapshotStore,
        mode: SessionMode,
        steps: &[Step],
        name: &str,
        attempt: u32,
    ) -> AttemptOutcome {
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                return AttemptOutcome {
                    steps: Vec::new(),
                    error: Some(e.to_string()),
                    screenshot: None,
                }
            }
        };

        let nav_timeout = svc
            .quirks
            .nav_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.nav_timeout());

        let prepared: HarnessResult<()> = async {
            if mode == SessionMode::Authenticated {
                let snapshot = store
                    .load(&svc.key)
                    .map_err(HarnessError::from)?
                    .ok_or_else(|| HarnessError::Browser("session snapshot missing".to_string()))?;
                bootstrap::restore_session(&page, base, &snapshot, nav_timeout).await?;
            }
            Ok(())
        }
        .await;
        if let Err(e) = prepared {
            let screenshot = self.save_failure_screenshot(&page, svc, name, attempt).await;
            browser::close_page(&page).await;
            return AttemptOutcome { steps: Vec::new(), error: Some(e.to_string()), screenshot };
        }

        let ctx = ExecContext {
            base_url: base,
            credentials,
            nav_timeout,
            default_wait: DEFAULT_WAIT,
        };

        let mut outcome = match tokio::time::timeout(
            self.config.check_timeout(),
            executor::run_steps(&page, &ctx, steps),
        )
        .await
        {
            Ok(step_outcomes) => {
                let error = step_outcomes.iter().find_map(|o| o.error.clone());
                AttemptOutcome { steps: step_outcomes, error, screenshot: None }
            }
            Err(_) => AttemptOutcome {
                steps: Vec::new(),
                error: Some(format!("check timed out after {}ms", self.config.check_timeout_ms)),
                screenshot: None,
            },
        };

        if outcome.error.is_some() {
            outcome.screenshot = self.save_failure_screenshot(&page, svc, name, attempt).await;
        }

        browser::close_page(&page).await;
        outcome
    }

    async fn run_http_check(
        &self,
        prober: &Prober,
        base: &Url,
        name: &str,
        path: &str,
        expect_status: u16,
        expect_json: Option<&(String, String)>,
    ) -> CheckReport {
        let start = Instant::now();
        let result = prober.http_check(base, path, expect_status, expect_json).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!("✓ {} ({} ms)", name, duration_ms);
                CheckReport {
                    name: name.to_string(),
                    kind: CheckKind::Http,
                    session: None,
                    status: CheckStatus::Passed,
                    attempts: 1,
                    duration_ms,
                    steps: Vec::new(),
                    error: None,
                    screenshot: None,
                }
            }
            Err(e) => {
                error!("✗ {} - {}", name, e);
                CheckReport {
                    name: name.to_string(),
                    kind: CheckKind::Http,
                    session: None,
                    status: CheckStatus::Failed,
                    attempts: 1,
                    duration_ms,
                    steps: Vec::new(),
                    error: Some(e.to_string()),
                    screenshot: None,
                }
            }
        }
    }

    async fn save_failure_screenshot(
        &self,
        page: &chromiumoxide::Page,
        svc: &ServiceSpec,
        name: &str,
        attempt: u32,
    ) -> Option<PathBuf> {
        let dir = self.config.artifacts_dir.join(&svc.key);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            debug!("artifacts dir: {}", e);
            return None;
        }
        let path = dir.join(format!("{}-{}.png", slugify(name), attempt));
        match executor::capture_screenshot(page, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                debug!("screenshot failed: {}", e);
                None
            }
        }
    }

    fn errored(
        &self,
        svc: &ServiceSpec,
        base_url: String,
        probe: Option<ProbeOutcome>,
        error: String,
        start: Instant,
    ) -> ServiceReport {
        ServiceReport {
            key: svc.key.clone(),
            name: svc.name.clone(),
            base_url,
            probe,
            bootstrap: None,
            checks: svc.checks.iter().map(|c| CheckReport::skipped(c, &error)).collect(),
            passed: false,
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(error),
        }
    }
}

#[derive(Debug, Default)]
struct AttemptOutcome {
    steps: Vec<StepOutcome>,
    error: Option<String>,
    screenshot: Option<PathBuf>,
}

/// Check names become artifact file names
fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokefleet_common::{Locator, LoginFlow, SuccessCondition};
    use test_case::test_case;

    fn spec(key: &str, env_prefix: &str, with_login: bool) -> ServiceSpec {
        ServiceSpec {
            key: key.to_string(),
            name: key.to_string(),
            env_prefix: env_prefix.to_string(),
            default_url: format!("https://{}.example.net", key),
            login: with_login.then(|| LoginFlow {
                path: "/login".to_string(),
                ready: vec![],
                username: Locator::css("#user"),
                password: Locator::css("#pass"),
                submit: Locator::css("#submit"),
                success: SuccessCondition::TitleIs { value: key.to_string() },
                success_timeout_ms: 5000,
            }),
            checks: vec![Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![Step::goto("/")],
            }],
            quirks: Default::default(),
        }
    }

    fn runner(config: HarnessConfig) -> SmokeRunner {
        SmokeRunner::with_fleet(
            config,
            vec![spec("alpha", "ALPHA", false), spec("beta", "BETA", true)],
        )
    }

    #[test]
    fn test_select_defaults_to_unskipped_fleet() {
        let config: HarnessConfig =
            toml::from_str("[services.alpha]\nskip = true").unwrap();
        let runner = runner(config);

        let keys: Vec<_> =
            runner.select(&[]).unwrap().iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys, vec!["beta"]);
    }

    #[test]
    fn test_explicit_selection_overrides_skip() {
        let config: HarnessConfig =
            toml::from_str("[services.alpha]\nskip = true").unwrap();
        let runner = runner(config);

        let keys: Vec<_> = runner
            .select(&["alpha".to_string()])
            .unwrap()
            .iter()
            .map(|s| s.key.clone())
            .collect();
        assert_eq!(keys, vec!["alpha"]);
    }

    #[test]
    fn test_select_unknown_service() {
        let runner = runner(HarnessConfig::default());
        let err = runner.select(&["plex".to_string()]).unwrap_err();
        assert!(err.to_string().contains("plex"));
    }

    #[test]
    fn test_base_url_precedence() {
        std::env::remove_var("ALPHA_URL");
        let config: HarnessConfig =
            toml::from_str("[services.alpha]\nurl = \"http://cfg.local\"").unwrap();
        let runner = runner(config);
        let alpha = &runner.fleet()[0];

        // config file beats built-in default
        assert_eq!(runner.resolve_base_url(alpha).unwrap().as_str(), "http://cfg.local/");

        // environment beats config file
        std::env::set_var("ALPHA_URL", "http://env.local");
        assert_eq!(runner.resolve_base_url(alpha).unwrap().as_str(), "http://env.local/");
        std::env::remove_var("ALPHA_URL");
    }

    #[test]
    fn test_invalid_base_url_is_an_error() {
        std::env::set_var("BETA_URL", "not a url");
        let runner = runner(HarnessConfig::default());
        let beta = &runner.fleet()[1];
        assert!(runner.resolve_base_url(beta).is_err());
        std::env::remove_var("BETA_URL");
    }

    #[test_case("login page loads", "login-page-loads")]
    #[test_case("navigate to Wanted", "navigate-to-wanted")]
    #[test_case("api health endpoint returns ok", "api-health-endpoint-returns-ok")]
    #[test_case("  spaced  out  ", "spaced-out")]
    fn test_slugify(name: &str, expected: &str) {
        assert_eq!(slugify(name), expected);
    }

    #[test]
    fn test_errored_report_skips_every_check() {
        let runner = runner(HarnessConfig::default());
        let beta = &runner.fleet()[1];
        let report = runner.errored(
            beta,
            beta.default_url.clone(),
            None,
            "service unreachable".to_string(),
            Instant::now(),
        );

        assert!(!report.passed);
        assert_eq!(report.checks.len(), beta.checks.len());
        assert!(report.checks.iter().all(|c| c.status == CheckStatus::Skipped));
        assert_eq!(report.error.as_deref(), Some("service unreachable"));
    }
}
