//! Navidrome music server
//!
//! The SPA triggers a transient renderer crash in containerized Chromium
//! that recovers after a few seconds, hence the recovery quirk and the
//! generous settle delay before the login form is touched.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "navidrome".to_string(),
        name: "Navidrome".to_string(),
        env_prefix: "NAVIDROME".to_string(),
        default_url: "https://navidrome.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/".to_string(),
            ready: vec![Step::expect_url_within("#/login", 15000)],
            username: Locator::css("input[name=\"username\"]"),
            password: Locator::css("input[name=\"password\"]"),
            submit: Locator::role("button", "Sign in"),
            success: SuccessCondition::UrlMatches { pattern: "#/album".to_string() },
            success_timeout_ms: 5000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_is("Navidrome"),
                    Step::expect_url("#/login"),
                    Step::expect_visible(Locator::css("input[name=\"username\"]")),
                    Step::expect_visible(Locator::css("input[name=\"password\"]")),
                    Step::expect_visible(Locator::role("button", "Sign in")),
                ],
            },
            Check::Browser {
                name: "albums are listed after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_url("#/album"),
                    Step::expect_text(Locator::css("#react-admin-title"), "Albums"),
                    Step::expect_visible(Locator::role("listitem", "")),
                ],
            },
            Check::Browser {
                name: "navigate to Artists".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("menuitem", "Artists")),
                    Step::expect_text(Locator::css("#react-admin-title"), "Artists"),
                ],
            },
            Check::Browser {
                name: "navigate to Songs".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("menuitem", "Songs")),
                    Step::expect_text(Locator::css("#react-admin-title"), "Songs"),
                ],
            },
            Check::Browser {
                name: "search box is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("textbox", "Search")),
                ],
            },
        ],
        quirks: Quirks {
            renderer_recovery: true,
            settle_ms: Some(5000),
            nav_timeout_ms: Some(20000),
        },
    }
}
