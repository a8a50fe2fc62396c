//! Immich photo library
//!
//! The login page is reached directly at `/auth/login` (the SPA redirect
//! from `/` is slow), and the post-login jump to `/photos` can take up to
//! half a minute while the timeline hydrates.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
    USERNAME_PLACEHOLDER,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "immich".to_string(),
        name: "Immich".to_string(),
        env_prefix: "IMMICH".to_string(),
        default_url: "https://immich.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/auth/login".to_string(),
            ready: vec![Step::expect_visible_within(Locator::role("heading", "Login"), 15000)],
            username: Locator::role("textbox", "Email"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Login"),
            success: SuccessCondition::UrlMatches { pattern: "/photos".to_string() },
            success_timeout_ms: 30000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_matches("Login.*Immich"),
                    Step::expect_visible(Locator::role("heading", "Login")),
                    Step::expect_visible(Locator::role("textbox", "Email")),
                    Step::expect_visible(Locator::role("textbox", "Password")),
                    Step::expect_visible(Locator::role("button", "Login")),
                ],
            },
            Check::Browser {
                name: "photos page loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/photos"),
                    Step::expect_title_matches("Photos.*Immich"),
                    Step::expect_visible(Locator::role("link", "Photos")),
                ],
            },
            Check::Browser {
                name: "navigate to Explore".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/photos"),
                    Step::click(Locator::role("link", "Explore")),
                    Step::expect_url("/explore"),
                ],
            },
            Check::Browser {
                name: "navigate to Sharing".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/photos"),
                    Step::click(Locator::role("link", "Sharing")),
                    Step::expect_url("/sharing"),
                ],
            },
            Check::Browser {
                name: "search is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/photos"),
                    Step::expect_visible(Locator::role("combobox", "Search your photos")),
                ],
            },
            Check::Browser {
                name: "user menu shows logged-in user".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/photos"),
                    Step::expect_visible(Locator::role("button", USERNAME_PLACEHOLDER)),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
