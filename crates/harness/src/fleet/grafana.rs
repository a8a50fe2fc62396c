//! Grafana dashboards
//!
//! The login form carries stable `data-testid` attributes, so this is the
//! one service located by test id instead of role. Also the only service
//! with a plain HTTP health check (`/api/health` reports database state).

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "grafana".to_string(),
        name: "Grafana".to_string(),
        env_prefix: "GRAFANA".to_string(),
        default_url: "http://admin:3000".to_string(),
        login: Some(LoginFlow {
            path: "/login".to_string(),
            ready: vec![Step::expect_title_is("Grafana")],
            username: Locator::test_id("data-testid Username input field"),
            password: Locator::test_id("data-testid Password input field"),
            submit: Locator::test_id("data-testid Login button"),
            success: SuccessCondition::TitleMatches {
                pattern: "Home - Dashboards - Grafana".to_string(),
            },
            success_timeout_ms: 5000,
        }),
        checks: vec![
            Check::Browser {
                name: "login page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/login"),
                    Step::expect_title_is("Grafana"),
                    Step::expect_visible(Locator::test_id("data-testid Username input field")),
                    Step::expect_visible(Locator::test_id("data-testid Password input field")),
                    Step::expect_visible(Locator::test_id("data-testid Login button")),
                ],
            },
            Check::Http {
                name: "API health endpoint returns ok".to_string(),
                path: "/api/health".to_string(),
                expect_status: 200,
                expect_json: Some(("/database".to_string(), "ok".to_string())),
            },
            Check::Browser {
                name: "home dashboard loads after login".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_title_matches("Grafana"),
                    Step::expect_visible(Locator::role("heading", "Welcome to Grafana")),
                ],
            },
            Check::Browser {
                name: "navigate to Dashboards".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("link", "Dashboards")),
                    Step::expect_title_matches("Dashboards - Grafana"),
                ],
            },
            Check::Browser {
                name: "navigate to Alerting".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::click(Locator::role("link", "Alerting")),
                    Step::expect_title_matches("Alerting - Grafana"),
                ],
            },
            Check::Browser {
                name: "search is available".to_string(),
                session: SessionMode::Authenticated,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("button", "Search...")),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
