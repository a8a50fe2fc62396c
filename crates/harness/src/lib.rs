//! Smokefleet harness
//!
//! Drives a fleet of self-hosted web services through Chromium (via CDP)
//! and reports whether each one is reachable, renders its login page,
//! accepts its credentials, and exposes its key post-login destinations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SmokeRunner (per service)                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  probe      ── HTTP reachability gate (no browser)           │
//! │  browser    ── headless Chromium launch + crash watch        │
//! │  fresh      ── checks against a cookie-free page             │
//! │  bootstrap  ── login once, snapshot cookies + localStorage   │
//! │  restore    ── seed snapshot into new pages, run the rest    │
//! │  report     ── ✓/✗ console lines + artifacts/report.json     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ServiceSpec (data)                                          │
//! │    ├── login: path, locators, success condition              │
//! │    └── checks: [Browser { steps } | Http { path, expect }]   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session snapshots use the Playwright `storageState` JSON shape, so a
//! capture taken here can seed a Playwright context and vice versa.

pub mod bootstrap;
pub mod browser;
pub mod error;
pub mod executor;
pub mod fleet;
pub mod locator;
pub mod probe;
pub mod report;
pub mod runner;

pub use bootstrap::{BootstrapOutcome, Bootstrapper};
pub use browser::{BrowserSession, LaunchSpec};
pub use error::{HarnessError, HarnessResult};
pub use probe::{ProbeOutcome, Prober};
pub use report::{CheckReport, CheckStatus, ServiceReport, SuiteReport};
pub use runner::{AuthReport, ProbeReport, RunOptions, SmokeRunner};
