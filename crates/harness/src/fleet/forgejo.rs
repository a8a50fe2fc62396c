//! Forgejo git forge
//!
//! Multi-page app, no SPA settling needed. The post-login avatar in the
//! navigation bar is an image named after the user.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
    USERNAME_PLACEHOLDER,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "forgejo".to_string(),
        name: "Forgejo".to_string(),
        env_prefix: "FORGEJO".to_string(),
        default_url: "https://forgejo.bobtail-clownfish.ts.net".to_string(),
        login: Some(LoginFlow {
            path: "/user/login".to_string(),
            ready: vec![Step::wait_for(Locator::role("heading", "Sign in"), 5000)],
            username: Locator::role("textbox", "Username or email address"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Sign in"),
            success: SuccessCondition::TitleMatches { pattern: "Dashboard".to_string() },
            success_timeout_ms: 15000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/user/login"),
                    Step::expect_title_matches("Sign in"),
                    Step::expect_visible(Locator::role("heading", "Sign in")),
                    Step::expect_visible(Locator::role("textbox", "Username or email address")),
                    Step::expect_visible(Locator::role("textbox", "Password")),
                    Step::expect_visible(Locator::role("button", "Sign in")),
                ],
            },
            Check::Browser {
                name: "dashboard loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_matches("Dashboard"),
                    Step::expect_visible(Locator::role("link", "Dashboard")),
                ],
            },
            Check::Browser {
                name: "navigate to Explore".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role_exact("link", "Explore")),
                    Step::expect_url("/explore"),
                ],
            },
            Check::Browser {
                name: "navigate to Issues".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("link", "Issues")),
                    Step::expect_url("/issues"),
                ],
            },
            Check::Browser {
                name: "navigate to Pull requests".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("link", "Pull requests")),
                    Step::expect_url("/pulls"),
                ],
            },
            Check::Browser {
                name: "user menu shows logged-in user".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("img", USERNAME_PLACEHOLDER)),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
