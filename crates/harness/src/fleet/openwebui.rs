//! Open WebUI chat frontend
//!
//! `/` redirects to the auth page and takes a moment to render; login
//! success is signalled by the "New Chat" link rather than a title or
//! URL change.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "openwebui".to_string(),
        name: "Open WebUI".to_string(),
        env_prefix: "OPENWEBUI".to_string(),
        default_url: "https://llm.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/".to_string(),
            ready: vec![Step::wait_for(Locator::text("Sign in to Open WebUI"), 5000)],
            username: Locator::role("textbox", "Email"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Sign in"),
            success: SuccessCondition::Visible {
                locator: Locator::role("link", "New Chat"),
            },
            success_timeout_ms: 5000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::text("Sign in to Open WebUI")),
                    Step::expect_visible(Locator::role("textbox", "Email")),
                    Step::expect_visible(Locator::role("textbox", "Password")),
                    Step::expect_visible(Locator::role("button", "Sign in")),
                ],
            },
            Check::Browser {
                name: "chat page loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("link", "New Chat")),
                ],
            },
            Check::Browser {
                name: "user profile menu is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("button", "Open User Profile Menu")),
                ],
            },
            Check::Browser {
                name: "search is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role_exact("button", "Search")),
                ],
            },
            Check::Browser {
                name: "navigate to Notes".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("link", "Notes")),
                    Step::expect_url("/notes"),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
