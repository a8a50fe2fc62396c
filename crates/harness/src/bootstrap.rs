//! Authenticate-once session bootstrap
//!
//! Login is the slowest and flakiest part of every flow, so it runs once
//! per service and the resulting cookies and localStorage are snapshotted
//! to disk. Authenticated checks restore the snapshot into a fresh page
//! instead of logging in again. Snapshots age out and are recaptured; a
//! reused snapshot that turns out to be dead is invalidated by the runner
//! and captured once more.

use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::Page;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use smokefleet_common::session::{OriginState, SnapshotCookie, StorageItem};
use smokefleet_common::{
    Credentials, FieldValue, LoginFlow, ServiceSpec, SnapshotStore, Step, StorageSnapshot,
};

use crate::browser::{self, BrowserSession};
use crate::error::{HarnessError, HarnessResult};
use crate::executor::{self, ExecContext};

/// Attempts at the initial navigation for renderer-recovery services
const RECOVERY_ATTEMPTS: usize = 2;

/// How a usable session came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// Snapshot on disk was fresh and used as-is
    Reused,
    /// Logged in and captured a new snapshot
    Captured,
    /// Reused snapshot failed mid-run; re-authenticated once
    Refreshed,
    /// Service has no login flow
    NoLogin,
}

impl fmt::Display for BootstrapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BootstrapOutcome::Reused => "reused",
            BootstrapOutcome::Captured => "captured",
            BootstrapOutcome::Refreshed => "refreshed",
            BootstrapOutcome::NoLogin => "no-login",
        };
        f.write_str(s)
    }
}

/// Decides between reusing a stored session and logging in again
pub struct Bootstrapper<'a> {
    store: &'a SnapshotStore,
    max_age: chrono::Duration,
    nav_timeout: Duration,
    default_wait: Duration,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(
        store: &'a SnapshotStore,
        max_age: chrono::Duration,
        nav_timeout: Duration,
        default_wait: Duration,
    ) -> Self {
        Self { store, max_age, nav_timeout, default_wait }
    }

    /// Make sure a usable snapshot exists for the service, logging in
    /// when there is none, it has gone stale, or `force` is set.
    pub async fn ensure(
        &self,
        session: &BrowserSession,
        svc: &ServiceSpec,
        base: &Url,
        credentials: Option<&Credentials>,
        force: bool,
    ) -> HarnessResult<BootstrapOutcome> {
        if svc.login.is_none() {
            // the landing page must render before an empty snapshot counts
            let page = session.new_page().await?;
            let landed = async {
                executor::navigate(&page, base, self.nav_timeout).await?;
                executor::page_title(&page).await?;
                Ok::<(), HarnessError>(())
            }
            .await;
            browser::close_page(&page).await;
            landed?;
            // uniform artifact shape: login-less services get an empty file
            self.store.save(&svc.key, &StorageSnapshot::empty_now()).map_err(HarnessError::from)?;
            return Ok(BootstrapOutcome::NoLogin);
        }

        if !force {
            if let Some(snapshot) = self.store.load(&svc.key).map_err(HarnessError::from)? {
                if !snapshot.is_stale(self.max_age, Utc::now()) {
                    debug!("{}: reusing session snapshot", svc.key);
                    return Ok(BootstrapOutcome::Reused);
                }
                info!("{}: session snapshot stale, re-authenticating", svc.key);
            }
        }

        self.login_and_capture(session, svc, base, credentials).await?;
        Ok(BootstrapOutcome::Captured)
    }

    /// Run the login flow and persist the captured session
    pub async fn login_and_capture(
        &self,
        session: &BrowserSession,
        svc: &ServiceSpec,
        base: &Url,
        credentials: Option<&Credentials>,
    ) -> HarnessResult<()> {
        let flow = svc.login.as_ref().ok_or_else(|| HarnessError::InvalidFlow {
            service: svc.key.clone(),
            reason: "service has no login flow".to_string(),
        })?;
        let credentials = credentials.ok_or_else(|| HarnessError::LoginFailed {
            service: svc.key.clone(),
            reason: "credentials not resolved".to_string(),
        })?;

        let page = self.open_login_page(session, svc, base, flow).await?;
        let result = async {
            self.run_login(&page, svc, flow, base, credentials).await?;
            let snapshot = capture_snapshot(&page).await?;
            let path = self.store.save(&svc.key, &snapshot).map_err(HarnessError::from)?;
            info!(
                "{}: session captured ({} cookies, {} origins) -> {}",
                svc.key,
                snapshot.cookies.len(),
                snapshot.origins.len(),
                path.display()
            );
            Ok(())
        }
        .await;
        browser::close_page(&page).await;
        result
    }

    /// Drop the stored snapshot, forcing the next run to authenticate
    pub fn invalidate(&self, key: &str) -> HarnessResult<bool> {
        self.store.invalidate(key).map_err(HarnessError::from)
    }

    async fn open_login_page(
        &self,
        session: &BrowserSession,
        svc: &ServiceSpec,
        base: &Url,
        flow: &LoginFlow,
    ) -> HarnessResult<Page> {
        let url = executor::resolve_url(base, &flow.path)?;
        let nav_timeout =
            svc.quirks.nav_timeout_ms.map(Duration::from_millis).unwrap_or(self.nav_timeout);
        let attempts = if svc.quirks.renderer_recovery { RECOVERY_ATTEMPTS } else { 1 };

        let mut last_err: Option<HarnessError> = None;
        for attempt in 1..=attempts {
            let page = session.new_page().await?;
            let result = async {
                executor::navigate(&page, &url, nav_timeout).await?;
                if let Some(ms) = svc.quirks.settle_ms {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                // a crashed tab cannot evaluate anything
                executor::page_title(&page).await?;
                Ok::<(), HarnessError>(())
            }
            .await;
            match result {
                Ok(()) => return Ok(page),
                Err(e) => {
                    warn!("{}: initial navigation attempt {} failed: {}", svc.key, attempt, e);
                    browser::close_page(&page).await;
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| HarnessError::Browser("navigation never attempted".into())))
    }

    async fn run_login(
        &self,
        page: &Page,
        svc: &ServiceSpec,
        flow: &LoginFlow,
        base: &Url,
        credentials: &Credentials,
    ) -> HarnessResult<()> {
        let ctx = ExecContext {
            base_url: base,
            credentials: Some(credentials),
            nav_timeout: self.nav_timeout,
            default_wait: self.default_wait,
        };

        for step in &flow.ready {
            executor::run_step(page, &ctx, step)
                .await
                .map_err(|e| login_failed(svc, format!("login page not ready: {}", e)))?;
        }

        let steps = [
            Step::fill(flow.username.clone(), FieldValue::Username),
            Step::fill(flow.password.clone(), FieldValue::Password),
            Step::click(flow.submit.clone()),
        ];
        for step in &steps {
            executor::run_step(page, &ctx, step)
                .await
                .map_err(|e| login_failed(svc, e.to_string()))?;
        }

        executor::await_condition(page, &flow.success, Duration::from_millis(flow.success_timeout_ms))
            .await
            .map_err(|e| login_failed(svc, format!("no post-login signal: {}", e)))?;
        info!("{}: login succeeded", svc.key);
        Ok(())
    }
}

fn login_failed(svc: &ServiceSpec, reason: String) -> HarnessError {
    HarnessError::LoginFailed { service: svc.key.clone(), reason }
}

/// Read cookies and the current origin's localStorage out of the page
pub async fn capture_snapshot(page: &Page) -> HarnessResult<StorageSnapshot> {
    let cookies =
        page.get_cookies().await?.into_iter().map(snapshot_cookie).collect::<Vec<_>>();

    let raw: String = page
        .evaluate(LOCAL_STORAGE_DUMP)
        .await?
        .into_value()
        .map_err(|e| HarnessError::Browser(e.to_string()))?;
    let dump: LocalStorageDump = serde_json::from_str(&raw)?;

    let mut origins = Vec::new();
    if !dump.items.is_empty() {
        origins.push(OriginState {
            origin: dump.origin,
            local_storage: dump
                .items
                .into_iter()
                .map(|(name, value)| StorageItem { name, value })
                .collect(),
        });
    }

    Ok(StorageSnapshot { cookies, origins, captured_at: Some(Utc::now()) })
}

const LOCAL_STORAGE_DUMP: &str = "JSON.stringify({ origin: window.location.origin, \
     items: Object.keys(localStorage).map((k) => [k, localStorage.getItem(k)]) })";

#[derive(Deserialize)]
struct LocalStorageDump {
    origin: String,
    items: Vec<(String, String)>,
}

/// Seed a fresh page with a captured session.
///
/// The page first navigates to the base URL because localStorage is only
/// writable from its own origin, then cookies are installed and the page
/// reloaded so the app boots authenticated.
pub async fn restore_session(
    page: &Page,
    base: &Url,
    snapshot: &StorageSnapshot,
    nav_timeout: Duration,
) -> HarnessResult<()> {
    executor::navigate(page, base, nav_timeout).await?;

    for origin in &snapshot.origins {
        if origin.local_storage.is_empty() {
            continue;
        }
        if !same_origin(base, &origin.origin) {
            debug!("skipping localStorage for foreign origin {}", origin.origin);
            continue;
        }
        let js = seed_local_storage_js(&origin.local_storage)?;
        page.evaluate(js.as_str()).await?;
    }

    if !snapshot.cookies.is_empty() {
        let params =
            snapshot.cookies.iter().map(cookie_param).collect::<HarnessResult<Vec<_>>>()?;
        page.set_cookies(params).await?;
    }

    page.execute(ReloadParams::default()).await?;
    let _ = page.wait_for_navigation().await;
    Ok(())
}

fn snapshot_cookie(c: Cookie) -> SnapshotCookie {
    SnapshotCookie {
        name: c.name,
        value: c.value,
        domain: c.domain,
        path: c.path,
        expires: if c.session { -1.0 } else { c.expires },
        http_only: c.http_only,
        secure: c.secure,
        same_site: c.same_site.map(|s| same_site_str(&s).to_string()),
    }
}

fn cookie_param(c: &SnapshotCookie) -> HarnessResult<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(c.name.clone())
        .value(c.value.clone())
        .path(c.path.clone())
        .secure(c.secure)
        .http_only(c.http_only);
    if !c.domain.is_empty() {
        builder = builder.domain(c.domain.clone());
    }
    if let Some(ref same_site) = c.same_site {
        if let Some(parsed) = parse_same_site(same_site) {
            builder = builder.same_site(parsed);
        }
    }
    if !c.is_session() {
        builder = builder.expires(TimeSinceEpoch::new(c.expires));
    }
    builder.build().map_err(HarnessError::Browser)
}

fn same_site_str(v: &CookieSameSite) -> &'static str {
    match v {
        CookieSameSite::Strict => "Strict",
        CookieSameSite::Lax => "Lax",
        CookieSameSite::None => "None",
    }
}

fn parse_same_site(s: &str) -> Option<CookieSameSite> {
    match s {
        "Strict" => Some(CookieSameSite::Strict),
        "Lax" => Some(CookieSameSite::Lax),
        "None" => Some(CookieSameSite::None),
        _ => None,
    }
}

fn seed_local_storage_js(items: &[StorageItem]) -> HarnessResult<String> {
    let pairs: Vec<(&str, &str)> =
        items.iter().map(|i| (i.name.as_str(), i.value.as_str())).collect();
    let json = serde_json::to_string(&pairs)?;
    Ok(format!(
        "(() => {{ const items = {}; for (const [k, v] of items) localStorage.setItem(k, v); \
         return items.length; }})()",
        json
    ))
}

fn same_origin(base: &Url, origin: &str) -> bool {
    Url::parse(origin)
        .map(|o| {
            o.scheme() == base.scheme()
                && o.host_str() == base.host_str()
                && o.port_or_known_default() == base.port_or_known_default()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expires: f64) -> SnapshotCookie {
        SnapshotCookie {
            name: "sid".to_string(),
            value: "secret".to_string(),
            domain: "navidrome.example.net".to_string(),
            path: "/".to_string(),
            expires,
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    #[test]
    fn test_cookie_param_session_cookie_has_no_expiry() {
        let param = cookie_param(&sample(-1.0)).unwrap();
        assert_eq!(param.name, "sid");
        assert_eq!(param.domain.as_deref(), Some("navidrome.example.net"));
        assert!(param.expires.is_none());
        assert_eq!(param.same_site, Some(CookieSameSite::Lax));
    }

    #[test]
    fn test_cookie_param_persistent_cookie_keeps_expiry() {
        let param = cookie_param(&sample(1_900_000_000.0)).unwrap();
        assert!(param.expires.is_some());
        assert_eq!(param.http_only, Some(true));
        assert_eq!(param.secure, Some(true));
    }

    #[test]
    fn test_unknown_same_site_is_dropped_not_fatal() {
        let mut cookie = sample(-1.0);
        cookie.same_site = Some("Sideways".to_string());
        let param = cookie_param(&cookie).unwrap();
        assert!(param.same_site.is_none());
    }

    #[test]
    fn test_same_site_round_trips() {
        for name in ["Strict", "Lax", "None"] {
            let parsed = parse_same_site(name).unwrap();
            assert_eq!(same_site_str(&parsed), name);
        }
        assert!(parse_same_site("lax").is_none());
    }

    #[test]
    fn test_seed_local_storage_js_escapes_values() {
        let items = vec![StorageItem {
            name: "auth".to_string(),
            value: "{\"token\":\"a\\\"b\"}".to_string(),
        }];
        let js = seed_local_storage_js(&items).unwrap();
        assert!(js.contains("localStorage.setItem"));
        // serde escaping keeps the payload inside the array literal
        assert!(js.contains("\\\"token\\\""));
    }

    #[test]
    fn test_same_origin() {
        let base = Url::parse("https://jellyfin.example.net").unwrap();
        assert!(same_origin(&base, "https://jellyfin.example.net"));
        assert!(same_origin(&base, "https://jellyfin.example.net:443"));
        assert!(!same_origin(&base, "http://jellyfin.example.net"));
        assert!(!same_origin(&base, "https://sonarr.example.net"));
        assert!(!same_origin(&base, "not a url"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(BootstrapOutcome::Reused.to_string(), "reused");
        assert_eq!(BootstrapOutcome::NoLogin.to_string(), "no-login");
        let json = serde_json::to_string(&BootstrapOutcome::NoLogin).unwrap();
        assert_eq!(json, "\"no_login\"");
    }
}
