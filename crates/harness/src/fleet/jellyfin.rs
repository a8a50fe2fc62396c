//! Jellyfin media server
//!
//! The SPA renders the login form at `/` after a short delay and lands on
//! `#/home.html` once signed in. The user-menu check resolves the
//! `{username}` placeholder against the configured credentials at run time.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
    USERNAME_PLACEHOLDER,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "jellyfin".to_string(),
        name: "Jellyfin".to_string(),
        env_prefix: "JELLYFIN".to_string(),
        default_url: "https://jellyfin.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/".to_string(),
            ready: vec![Step::wait_for(Locator::role("heading", "Please sign in"), 5000)],
            username: Locator::role("textbox", "User"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Sign In"),
            success: SuccessCondition::UrlMatches { pattern: "#/home\\.html".to_string() },
            success_timeout_ms: 15000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_is("Jellyfin"),
                    Step::expect_visible(Locator::role("heading", "Please sign in")),
                    Step::expect_visible(Locator::role("textbox", "User")),
                    Step::expect_visible(Locator::role("textbox", "Password")),
                    Step::expect_visible(Locator::role("button", "Sign In")),
                ],
            },
            Check::Browser {
                name: "home page loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_url("#/home\\.html"),
                    Step::expect_visible(Locator::role("heading", "My Media")),
                ],
            },
            Check::Browser {
                name: "media libraries are listed".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("heading", "My Media")),
                    Step::expect_visible(Locator::role_exact("link", "Movies")),
                    Step::expect_visible(Locator::role_exact("link", "Shows")),
                ],
            },
            Check::Browser {
                name: "search is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("button", "Search")),
                ],
            },
            Check::Browser {
                name: "user menu shows logged-in user".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("button", USERNAME_PLACEHOLDER)),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
