//! Chromium lifecycle over the DevTools protocol
//!
//! One [`BrowserSession`] per service keeps cookie state isolated between
//! services and lets a crashed browser take down only its own checks.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::inspector::EventTargetCrashed;
use chromiumoxide::cdp::browser_protocol::page::CloseParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{HarnessError, HarnessResult};

/// Flags for running Chromium in containers and over software GL.
/// Matched to what the fleet's CI runner needs: no /dev/shm, no DBus,
/// no GPU.
pub const CONTAINER_FLAGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-dbus",
    "--use-gl=swiftshader",
    "--disable-gpu-compositing",
    "--disable-features=VizDisplayCompositor",
];

/// How to launch Chromium
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub headless: bool,
    pub ignore_https_errors: bool,
    pub viewport: (u32, u32),
    /// Explicit executable; falls back to [`detect_chromium`], then to
    /// chromiumoxide's own detection
    pub executable: Option<PathBuf>,
}

impl Default for LaunchSpec {
    fn default() -> Self {
        Self {
            headless: true,
            ignore_https_errors: true,
            viewport: (1280, 720),
            executable: None,
        }
    }
}

/// A launched Chromium with its CDP event loop
pub struct BrowserSession {
    browser: Browser,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    pub async fn launch(spec: &LaunchSpec) -> HarnessResult<Self> {
        let (width, height) = spec.viewport;
        let mut builder = BrowserConfig::builder().no_sandbox().window_size(width, height);
        for flag in CONTAINER_FLAGS {
            builder = builder.arg(*flag);
        }
        if spec.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if !spec.headless {
            builder = builder.with_head();
        }
        let executable = spec.executable.clone().or_else(detect_chromium);
        let auto_detected = executable.is_none();
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(HarnessError::Browser)?;

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(_) if auto_detected => return Err(HarnessError::ChromiumNotFound),
            Err(e) => return Err(e.into()),
        };

        // The handler drives all CDP IO and must be polled for the
        // browser to make progress.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler: Some(handle) })
    }

    /// Open a blank page. Renderer crashes are logged as they arrive so a
    /// dead tab is visible in the run log, not just as a step timeout.
    pub async fn new_page(&self) -> HarnessResult<Page> {
        let page = self.browser.new_page("about:blank").await?;
        if let Ok(mut crashes) = page.event_listener::<EventTargetCrashed>().await {
            tokio::spawn(async move {
                while crashes.next().await.is_some() {
                    warn!("renderer crash reported");
                }
            });
        }
        Ok(page)
    }

    pub async fn close(mut self) -> HarnessResult<()> {
        self.browser.close().await?;
        if let Some(handle) = self.handler.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Close a page's target, tolerating a tab that is already gone
pub async fn close_page(page: &Page) {
    let _ = page.execute(CloseParams::default()).await;
}

/// Look for a Chromium executable in the usual places.
/// `SMOKEFLEET_CHROMIUM` wins when set.
pub fn detect_chromium() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SMOKEFLEET_CHROMIUM") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/snap/bin/chromium",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ];
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
