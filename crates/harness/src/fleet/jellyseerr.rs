//! Jellyseerr request manager
//!
//! Authenticates against the Jellyfin account backend, so the login
//! heading takes a while to appear while it probes upstream.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "jellyseerr".to_string(),
        name: "Jellyseerr".to_string(),
        env_prefix: "JELLYSEERR".to_string(),
        default_url: "https://jellyseerr.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/login".to_string(),
            ready: vec![Step::expect_visible_within(
                Locator::role("heading", "Login with Jellyfin"),
                15000,
            )],
            username: Locator::role("textbox", "Username"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Sign In"),
            success: SuccessCondition::TitleMatches { pattern: "Discover".to_string() },
            success_timeout_ms: 15000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/login"),
                    Step::expect_title_matches("Sign In"),
                    Step::expect_visible(Locator::role("heading", "Login with Jellyfin")),
                    Step::expect_visible(Locator::role("textbox", "Username")),
                    Step::expect_visible(Locator::role("textbox", "Password")),
                    Step::expect_visible(Locator::role("button", "Sign In")),
                ],
            },
            Check::Browser {
                name: "discover page loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_matches("Discover"),
                    Step::expect_visible(Locator::role_exact("link", "Discover")),
                ],
            },
            Check::Browser {
                name: "navigate to Movies".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role_exact("link", "Movies")),
                    Step::expect_url("/discover/movies"),
                ],
            },
            Check::Browser {
                name: "navigate to Series".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role_exact("link", "Series")),
                    Step::expect_url("/discover/tv"),
                ],
            },
            Check::Browser {
                name: "search is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("searchbox", "Search")),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
