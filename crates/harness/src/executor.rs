//! Step execution against a live page
//!
//! Assertions poll until their deadline instead of sampling once, the
//! way interactive SPAs demand: titles, URLs and element visibility all
//! settle some time after navigation. Interactions resolve elements
//! through the tag-and-resolve scheme in [`crate::locator`] and then use
//! native CDP input.

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use regex::Regex;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use smokefleet_common::{Credentials, FieldValue, Locator, Step, SuccessCondition, TitleMatch};

use crate::error::{HarnessError, HarnessResult};
use crate::locator;

/// Tokens for the tag-and-resolve attribute, unique per process
static HIT_TOKEN: AtomicU64 = AtomicU64::new(1);

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLICK_SETTLE: Duration = Duration::from_millis(100);

/// Execution context shared by the steps of one check
pub struct ExecContext<'a> {
    pub base_url: &'a Url,
    pub credentials: Option<&'a Credentials>,
    /// Budget for one navigation
    pub nav_timeout: Duration,
    /// Default budget for polling assertions and element resolution
    pub default_wait: Duration,
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub label: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run steps in order, stopping at the first failure
pub async fn run_steps(page: &Page, ctx: &ExecContext<'_>, steps: &[Step]) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        let label = step.label();
        debug!("step: {}", label);
        let start = Instant::now();
        let result = run_step(page, ctx, step).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(()) => outcomes.push(StepOutcome { label, duration_ms, error: None }),
            Err(e) => {
                outcomes.push(StepOutcome { label, duration_ms, error: Some(e.to_string()) });
                break;
            }
        }
    }
    outcomes
}

pub fn steps_passed(outcomes: &[StepOutcome]) -> bool {
    outcomes.iter().all(|o| o.error.is_none())
}

/// Execute a single step
pub async fn run_step(page: &Page, ctx: &ExecContext<'_>, step: &Step) -> HarnessResult<()> {
    match step {
        Step::Goto { path } => {
            let url = resolve_url(ctx.base_url, path)?;
            navigate(page, &url, ctx.nav_timeout).await
        }
        Step::WaitFor { locator, timeout_ms } => {
            let locator = contextual(ctx, locator);
            wait_visible(page, &locator, Duration::from_millis(*timeout_ms)).await
        }
        Step::Fill { locator, value } => {
            let locator = contextual(ctx, locator);
            let element = resolve_element(page, &locator, ctx.default_wait).await?;
            let text = field_text(ctx, step, value)?;
            element.click().await?;
            // select prefilled content so the typed value replaces it
            let _ = element
                .call_js_fn("function() { if (this.select) this.select(); }", false)
                .await;
            element.type_str(&text).await?;
            Ok(())
        }
        Step::Click { locator } => {
            let locator = contextual(ctx, locator);
            let element = resolve_element(page, &locator, ctx.default_wait).await?;
            element.click().await?;
            tokio::time::sleep(CLICK_SETTLE).await;
            Ok(())
        }
        Step::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(())
        }
        Step::ExpectVisible { locator, timeout_ms } => {
            let locator = contextual(ctx, locator);
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ctx.default_wait);
            wait_visible(page, &locator, timeout).await
        }
        Step::ExpectTitle { title, timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ctx.default_wait);
            expect_title(page, title, timeout).await
        }
        Step::ExpectUrl { pattern, timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ctx.default_wait);
            expect_url(page, pattern, timeout).await
        }
        Step::ExpectText { locator, contains, timeout_ms } => {
            let locator = contextual(ctx, locator);
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ctx.default_wait);
            expect_text(page, &locator, contains, timeout).await
        }
    }
}

/// Wait until a login success condition holds
pub async fn await_condition(
    page: &Page,
    condition: &SuccessCondition,
    timeout: Duration,
) -> HarnessResult<()> {
    match condition {
        SuccessCondition::UrlMatches { pattern } => expect_url(page, pattern, timeout).await,
        SuccessCondition::TitleIs { value } => {
            expect_title(page, &TitleMatch::Is { value: value.clone() }, timeout).await
        }
        SuccessCondition::TitleMatches { pattern } => {
            expect_title(page, &TitleMatch::Matches { pattern: pattern.clone() }, timeout).await
        }
        SuccessCondition::Visible { locator } => wait_visible(page, locator, timeout).await,
    }
}

/// Resolve a check path against the service base URL.
/// Absolute URLs pass through for cross-page flows.
pub fn resolve_url(base: &Url, path: &str) -> HarnessResult<Url> {
    let parsed = if path.starts_with("http://") || path.starts_with("https://") {
        Url::parse(path)
    } else {
        base.join(path)
    };
    parsed.map_err(|e| HarnessError::StepFailed {
        step: format!("goto {}", path),
        reason: e.to_string(),
    })
}

/// Navigate and wait for the load to finish, bounded by `timeout`
pub async fn navigate(page: &Page, url: &Url, timeout: Duration) -> HarnessResult<()> {
    let nav = async {
        page.goto(url.as_str()).await?;
        // best effort; SPAs routinely finish loading after the event
        let _ = page.wait_for_navigation().await;
        Ok::<(), HarnessError>(())
    };
    match tokio::time::timeout(timeout, nav).await {
        Ok(result) => result,
        Err(_) => Err(HarnessError::Timeout(format!("navigation to {}", url))),
    }
}

/// Poll until the locator resolves to a visible element
pub async fn wait_visible(page: &Page, locator: &Locator, timeout: Duration) -> HarnessResult<()> {
    let js = locator::visible_js(locator);
    let deadline = Instant::now() + timeout;
    loop {
        // evaluation errors during a navigation are transient; keep polling
        if let Ok(true) = eval_bool(page, &js).await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Timeout(format!("visible {}", locator)));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn expect_title(page: &Page, title: &TitleMatch, timeout: Duration) -> HarnessResult<()> {
    let regex = match title {
        TitleMatch::Matches { pattern } => Some(compile(pattern, "title")?),
        _ => None,
    };
    let deadline = Instant::now() + timeout;
    let mut last = String::new();
    loop {
        if let Ok(current) = page_title(page).await {
            let matched = match title {
                TitleMatch::Is { value } => &current == value,
                TitleMatch::Contains { value } => current.contains(value),
                TitleMatch::Matches { .. } => {
                    regex.as_ref().map(|re| re.is_match(&current)).unwrap_or(false)
                }
            };
            if matched {
                return Ok(());
            }
            last = current;
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::AssertionFailed(format!("{} (last was {:?})", title, last)));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn expect_url(page: &Page, pattern: &str, timeout: Duration) -> HarnessResult<()> {
    let regex = compile(pattern, "url")?;
    let deadline = Instant::now() + timeout;
    let mut last = String::new();
    loop {
        if let Ok(current) = current_url(page).await {
            if regex.is_match(&current) {
                return Ok(());
            }
            last = current;
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::AssertionFailed(format!(
                "url ~ /{}/ (last was {:?})",
                pattern, last
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn expect_text(
    page: &Page,
    locator: &Locator,
    needle: &str,
    timeout: Duration,
) -> HarnessResult<()> {
    let js = locator::text_js(locator);
    let deadline = Instant::now() + timeout;
    let mut last: Option<String> = None;
    loop {
        if let Ok(text) = eval_opt_string(page, &js).await {
            if let Some(ref text) = text {
                if text.contains(needle) {
                    return Ok(());
                }
            }
            last = text;
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::AssertionFailed(format!(
                "{} to contain {:?} (last was {:?})",
                locator, needle, last
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Resolve a locator to a DOM handle, waiting for it to become visible
/// first so interactions land on a rendered control
async fn resolve_element(
    page: &Page,
    locator: &Locator,
    timeout: Duration,
) -> HarnessResult<Element> {
    let token = HIT_TOKEN.fetch_add(1, Ordering::Relaxed);
    let js = locator::tag_js(locator, token);
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(true) = eval_bool(page, &js).await {
            break;
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::ElementNotFound { locator: locator.to_string() });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    let element = page.find_element(locator::hit_selector(token)).await?;
    let _ = page.evaluate(locator::untag_js(token).as_str()).await;
    Ok(element)
}

/// Current URL as the page sees it. Read from the page itself rather
/// than target metadata so SPA hash fragments are included.
pub async fn current_url(page: &Page) -> HarnessResult<String> {
    eval_string(page, "window.location.href").await
}

pub async fn page_title(page: &Page) -> HarnessResult<String> {
    eval_string(page, "document.title").await
}

/// Full-page PNG screenshot for failure artifacts
pub async fn capture_screenshot(page: &Page, path: &Path) -> HarnessResult<()> {
    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(true)
        .build();
    let bytes = page.screenshot(params).await?;
    std::fs::write(path, bytes)?;
    Ok(())
}

fn contextual(ctx: &ExecContext<'_>, locator: &Locator) -> Locator {
    match ctx.credentials {
        Some(creds) => locator.substituted(&creds.username),
        None => locator.clone(),
    }
}

fn field_text(ctx: &ExecContext<'_>, step: &Step, value: &FieldValue) -> HarnessResult<String> {
    match value {
        FieldValue::Literal { value } => Ok(value.clone()),
        FieldValue::Username => ctx
            .credentials
            .map(|c| c.username.clone())
            .ok_or_else(|| missing_credentials(step)),
        FieldValue::Password => ctx
            .credentials
            .map(|c| c.password.expose_secret().to_string())
            .ok_or_else(|| missing_credentials(step)),
    }
}

fn missing_credentials(step: &Step) -> HarnessError {
    HarnessError::StepFailed {
        step: step.label(),
        reason: "credentials required but not resolved".to_string(),
    }
}

fn compile(pattern: &str, what: &str) -> HarnessResult<Regex> {
    Regex::new(pattern).map_err(|e| HarnessError::StepFailed {
        step: format!("expect {} ~ /{}/", what, pattern),
        reason: e.to_string(),
    })
}

async fn eval_bool(page: &Page, js: &str) -> HarnessResult<bool> {
    let result = page.evaluate(js).await?;
    result.into_value().map_err(|e| HarnessError::Browser(e.to_string()))
}

async fn eval_string(page: &Page, js: &str) -> HarnessResult<String> {
    let result = page.evaluate(js).await?;
    result.into_value().map_err(|e| HarnessError::Browser(e.to_string()))
}

async fn eval_opt_string(page: &Page, js: &str) -> HarnessResult<Option<String>> {
    let result = page.evaluate(js).await?;
    result.into_value().map_err(|e| HarnessError::Browser(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://jellyfin.example.net").unwrap()
    }

    #[test]
    fn test_resolve_url_relative() {
        assert_eq!(
            resolve_url(&base(), "/user/login").unwrap().as_str(),
            "https://jellyfin.example.net/user/login"
        );
        assert_eq!(resolve_url(&base(), "/").unwrap().as_str(), "https://jellyfin.example.net/");
    }

    #[test]
    fn test_resolve_url_absolute_passthrough() {
        let url = resolve_url(&base(), "http://admin:3000/api/health").unwrap();
        assert_eq!(url.as_str(), "http://admin:3000/api/health");
    }

    #[test]
    fn test_resolve_url_keeps_ports_and_schemes() {
        let base = Url::parse("http://localhost:4533").unwrap();
        let url = resolve_url(&base, "/app/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4533/app/");
    }

    #[test]
    fn test_steps_passed() {
        let ok = StepOutcome { label: "goto /".into(), duration_ms: 10, error: None };
        let bad = StepOutcome {
            label: "expect title".into(),
            duration_ms: 5000,
            error: Some("timeout".into()),
        };
        assert!(steps_passed(&[ok.clone()]));
        assert!(!steps_passed(&[ok, bad]));
        assert!(steps_passed(&[]));
    }

    #[test]
    fn test_step_outcome_serde_omits_empty_error() {
        let ok = StepOutcome { label: "goto /".into(), duration_ms: 10, error: None };
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_field_text_without_credentials() {
        let base = base();
        let ctx = ExecContext {
            base_url: &base,
            credentials: None,
            nav_timeout: Duration::from_secs(10),
            default_wait: Duration::from_secs(5),
        };
        let step = Step::fill(Locator::css("#user"), FieldValue::Username);
        match &step {
            Step::Fill { value, .. } => {
                assert!(field_text(&ctx, &step, value).is_err());
            }
            _ => unreachable!(),
        }
        let literal = Step::fill(Locator::css("#q"), FieldValue::Literal { value: "x".into() });
        match &literal {
            Step::Fill { value, .. } => {
                assert_eq!(field_text(&ctx, &literal, value).unwrap(), "x");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bad_regex_is_a_step_failure() {
        let err = compile("[", "url").unwrap_err();
        match err {
            HarnessError::StepFailed { step, .. } => assert!(step.contains("url")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
