//! Declarative fleet vocabulary: services, login flows, checks and steps
//!
//! A [`ServiceSpec`] describes one web service in the fleet: where it lives,
//! how to log in to it, and which smoke checks to run against it. Specs are
//! plain data so the harness can execute, list and serialize them uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One service in the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Stable lowercase identifier, used for selection and session files
    pub key: String,

    /// Human-readable name
    pub name: String,

    /// Environment variable prefix for credentials and URL override
    pub env_prefix: String,

    /// Base URL used when `{env_prefix}_URL` is not set
    pub default_url: String,

    /// Login flow, or `None` for services without authentication
    #[serde(default)]
    pub login: Option<LoginFlow>,

    /// Smoke checks to run, in order
    pub checks: Vec<Check>,

    /// Per-service workarounds
    #[serde(default)]
    pub quirks: Quirks,
}

impl ServiceSpec {
    pub fn has_login(&self) -> bool {
        self.login.is_some()
    }
}

/// How to authenticate against a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFlow {
    /// Path of the login page, relative to the base URL
    pub path: String,

    /// Steps that must pass before the form is interacted with
    #[serde(default)]
    pub ready: Vec<Step>,

    pub username: Locator,
    pub password: Locator,
    pub submit: Locator,

    /// Condition that signals a completed login
    pub success: SuccessCondition,

    /// How long to wait for the success condition
    #[serde(default = "default_success_timeout")]
    pub success_timeout_ms: u64,
}

fn default_success_timeout() -> u64 {
    5000
}

/// Signal that a login flow has completed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum SuccessCondition {
    /// Current URL matches a regex
    UrlMatches { pattern: String },

    /// Document title equals a string
    TitleIs { value: String },

    /// Document title matches a regex
    TitleMatches { pattern: String },

    /// An element is visible
    Visible { locator: Locator },
}

impl fmt::Display for SuccessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessCondition::UrlMatches { pattern } => write!(f, "url ~ /{}/", pattern),
            SuccessCondition::TitleIs { value } => write!(f, "title == {:?}", value),
            SuccessCondition::TitleMatches { pattern } => write!(f, "title ~ /{}/", pattern),
            SuccessCondition::Visible { locator } => write!(f, "visible {}", locator),
        }
    }
}

/// Per-service workarounds for services that misbehave under automation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Quirks {
    /// Retry initial navigation when the renderer tab crashes
    pub renderer_recovery: bool,

    /// Fixed settle delay after initial navigation, in milliseconds
    pub settle_ms: Option<u64>,

    /// Navigation timeout override, in milliseconds
    pub nav_timeout_ms: Option<u64>,
}

/// A single smoke check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Steps executed in a browser page
    Browser {
        name: String,
        #[serde(default)]
        session: SessionMode,
        steps: Vec<Step>,
    },

    /// Plain HTTP request with status and JSON assertions
    Http {
        name: String,
        path: String,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
        /// JSON pointer and expected value, e.g. ("/database", "ok")
        #[serde(default)]
        expect_json: Option<(String, String)>,
    },
}

fn default_expect_status() -> u16 {
    200
}

impl Check {
    pub fn name(&self) -> &str {
        match self {
            Check::Browser { name, .. } => name,
            Check::Http { name, .. } => name,
        }
    }

    /// Session mode for browser checks, `None` for HTTP checks
    pub fn session(&self) -> Option<SessionMode> {
        match self {
            Check::Browser { session, .. } => Some(*session),
            Check::Http { .. } => None,
        }
    }
}

/// Whether a browser check runs before or after authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Clean page with no stored state
    #[default]
    Fresh,
    /// Page restored from the captured session snapshot
    Authenticated,
}

/// A single step in a browser check or login flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a path relative to the base URL
    Goto { path: String },

    /// Wait until an element is visible
    WaitFor {
        locator: Locator,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
    },

    /// Fill an input field
    Fill { locator: Locator, value: FieldValue },

    /// Click an element
    Click { locator: Locator },

    /// Fixed delay (use sparingly)
    Sleep { ms: u64 },

    /// Assert an element becomes visible
    ExpectVisible {
        locator: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert the document title
    ExpectTitle {
        title: TitleMatch,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert the current URL matches a regex
    ExpectUrl {
        pattern: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert an element's text contains a substring
    ExpectText {
        locator: Locator,
        contains: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

impl Step {
    pub fn goto(path: &str) -> Self {
        Step::Goto { path: path.into() }
    }

    pub fn wait_for(locator: Locator, timeout_ms: u64) -> Self {
        Step::WaitFor { locator, timeout_ms }
    }

    pub fn fill(locator: Locator, value: FieldValue) -> Self {
        Step::Fill { locator, value }
    }

    pub fn click(locator: Locator) -> Self {
        Step::Click { locator }
    }

    pub fn sleep(ms: u64) -> Self {
        Step::Sleep { ms }
    }

    pub fn expect_visible(locator: Locator) -> Self {
        Step::ExpectVisible { locator, timeout_ms: None }
    }

    pub fn expect_visible_within(locator: Locator, timeout_ms: u64) -> Self {
        Step::ExpectVisible { locator, timeout_ms: Some(timeout_ms) }
    }

    pub fn expect_title_is(value: &str) -> Self {
        Step::ExpectTitle { title: TitleMatch::Is { value: value.into() }, timeout_ms: None }
    }

    pub fn expect_title_matches(pattern: &str) -> Self {
        Step::ExpectTitle { title: TitleMatch::Matches { pattern: pattern.into() }, timeout_ms: None }
    }

    pub fn expect_url(pattern: &str) -> Self {
        Step::ExpectUrl { pattern: pattern.into(), timeout_ms: None }
    }

    pub fn expect_url_within(pattern: &str, timeout_ms: u64) -> Self {
        Step::ExpectUrl { pattern: pattern.into(), timeout_ms: Some(timeout_ms) }
    }

    pub fn expect_text(locator: Locator, contains: &str) -> Self {
        Step::ExpectText { locator, contains: contains.into(), timeout_ms: None }
    }

    /// Short label for logs and reports. Never includes credential values.
    pub fn label(&self) -> String {
        match self {
            Step::Goto { path } => format!("goto {}", path),
            Step::WaitFor { locator, .. } => format!("wait_for {}", locator),
            Step::Fill { locator, value } => format!("fill {} <- {}", locator, value),
            Step::Click { locator } => format!("click {}", locator),
            Step::Sleep { ms } => format!("sleep {}ms", ms),
            Step::ExpectVisible { locator, .. } => format!("expect visible {}", locator),
            Step::ExpectTitle { title, .. } => format!("expect {}", title),
            Step::ExpectUrl { pattern, .. } => format!("expect url ~ /{}/", pattern),
            Step::ExpectText { locator, contains, .. } => {
                format!("expect {} to contain {:?}", locator, contains)
            }
        }
    }
}

/// Title assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum TitleMatch {
    Is { value: String },
    Contains { value: String },
    Matches { pattern: String },
}

impl fmt::Display for TitleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleMatch::Is { value } => write!(f, "title == {:?}", value),
            TitleMatch::Contains { value } => write!(f, "title contains {:?}", value),
            TitleMatch::Matches { pattern } => write!(f, "title ~ /{}/", pattern),
        }
    }
}

/// Value to type into a form field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FieldValue {
    /// Username from the service credentials
    Username,
    /// Password from the service credentials
    Password,
    /// Literal text
    Literal { value: String },
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Username => write!(f, "$username"),
            FieldValue::Password => write!(f, "$password"),
            FieldValue::Literal { value } => write!(f, "{:?}", value),
        }
    }
}

/// Placeholder in locator names replaced with the service username at runtime
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector
    Css { selector: String },

    /// `data-testid` attribute value
    TestId { value: String },

    /// ARIA role with accessible-name filter. Empty name matches any.
    Role {
        role: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        exact: bool,
    },

    /// Visible text content
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },

    /// Form control addressed by its label text
    Label { text: String },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css { selector: selector.into() }
    }

    pub fn test_id(value: &str) -> Self {
        Locator::TestId { value: value.into() }
    }

    /// Role locator with substring name matching (case-insensitive)
    pub fn role(role: &str, name: &str) -> Self {
        Locator::Role { role: role.into(), name: name.into(), exact: false }
    }

    /// Role locator with exact name matching
    pub fn role_exact(role: &str, name: &str) -> Self {
        Locator::Role { role: role.into(), name: name.into(), exact: true }
    }

    pub fn text(text: &str) -> Self {
        Locator::Text { text: text.into(), exact: false }
    }

    pub fn label(text: &str) -> Self {
        Locator::Label { text: text.into() }
    }

    /// Replace the `{username}` placeholder in name/text filters.
    ///
    /// Only usernames participate; passwords never appear in locators.
    pub fn substituted(&self, username: &str) -> Locator {
        let sub = |s: &str| s.replace(USERNAME_PLACEHOLDER, username);
        match self {
            Locator::Css { .. } | Locator::TestId { .. } => self.clone(),
            Locator::Role { role, name, exact } => Locator::Role {
                role: role.clone(),
                name: sub(name),
                exact: *exact,
            },
            Locator::Text { text, exact } => Locator::Text { text: sub(text), exact: *exact },
            Locator::Label { text } => Locator::Label { text: sub(text) },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "css:{}", selector),
            Locator::TestId { value } => write!(f, "testid:{}", value),
            Locator::Role { role, name, exact } => {
                if name.is_empty() {
                    write!(f, "role={}", role)
                } else if *exact {
                    write!(f, "role={}[={}]", role, name)
                } else {
                    write!(f, "role={}[{}]", role, name)
                }
            }
            Locator::Text { text, .. } => write!(f, "text:{}", text),
            Locator::Label { text } => write!(f, "label:{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_step_serde_tags() {
        let steps = vec![
            Step::goto("/login"),
            Step::wait_for(Locator::role("heading", "Please sign in"), 15000),
            Step::fill(Locator::css("input[name=\"username\"]"), FieldValue::Username),
            Step::click(Locator::role("button", "Sign In")),
            Step::expect_url("#/home\\.html"),
        ];
        let json = serde_json::to_value(&steps).unwrap();
        assert_eq!(json[0]["action"], "goto");
        assert_eq!(json[1]["action"], "wait_for");
        assert_eq!(json[1]["locator"]["by"], "role");
        assert_eq!(json[2]["value"]["source"], "username");
        assert_eq!(json[4]["action"], "expect_url");

        let back: Vec<Step> = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), steps.len());
    }

    #[test]
    fn test_fill_label_redacts_credentials() {
        let step = Step::fill(Locator::css("#pw"), FieldValue::Password);
        let label = step.label();
        assert!(label.contains("$password"));
        assert!(!label.contains("hunter2"));
    }

    #[test_case(Locator::css("#app"), "css:#app")]
    #[test_case(Locator::test_id("data-testid Login button"), "testid:data-testid Login button")]
    #[test_case(Locator::role("button", "Sign In"), "role=button[Sign In]")]
    #[test_case(Locator::role_exact("link", "Movies"), "role=link[=Movies]")]
    #[test_case(Locator::role("listitem", ""), "role=listitem")]
    #[test_case(Locator::text("Sign in to Open WebUI"), "text:Sign in to Open WebUI")]
    #[test_case(Locator::label("Password"), "label:Password")]
    fn test_locator_display(locator: Locator, expected: &str) {
        assert_eq!(locator.to_string(), expected);
    }

    #[test]
    fn test_username_substitution() {
        let loc = Locator::role("button", USERNAME_PLACEHOLDER);
        let got = loc.substituted("smoketest");
        assert_eq!(got, Locator::role("button", "smoketest"));

        // selectors are never substituted
        let css = Locator::css("{username}");
        assert_eq!(css.substituted("smoketest"), css);
    }

    #[test]
    fn test_default_session_mode_is_fresh() {
        let json = serde_json::json!({
            "kind": "browser",
            "name": "login page loads",
            "steps": [],
        });
        let check: Check = serde_json::from_value(json).unwrap();
        assert_eq!(check.session(), Some(SessionMode::Fresh));
    }

    #[test]
    fn test_http_check_defaults() {
        let json = serde_json::json!({
            "kind": "http",
            "name": "api health",
            "path": "/api/health",
        });
        let check: Check = serde_json::from_value(json).unwrap();
        match check {
            Check::Http { expect_status, expect_json, .. } => {
                assert_eq!(expect_status, 200);
                assert!(expect_json.is_none());
            }
            _ => panic!("expected http check"),
        }
    }
}
