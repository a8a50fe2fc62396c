//! Error types for the smoke-check engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Common(#[from] smokefleet_common::Error),

    #[error("Chromium not found. Install chromium or set SMOKEFLEET_CHROMIUM")]
    ChromiumNotFound,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("{service} unreachable after {attempts} attempts: {reason}")]
    Unreachable { service: String, attempts: usize, reason: String },

    #[error("Login failed for {service}: {reason}")]
    LoginFailed { service: String, reason: String },

    #[error("Invalid flow for {service}: {reason}")]
    InvalidFlow { service: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<chromiumoxide::error::CdpError> for HarnessError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        HarnessError::Browser(e.to_string())
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
