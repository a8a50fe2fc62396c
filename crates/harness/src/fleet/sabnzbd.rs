//! SABnzbd download manager
//!
//! No login form; access control happens at the network layer. Every
//! check runs against a fresh page.

use smokefleet_common::{Check, Locator, Quirks, ServiceSpec, SessionMode, Step};

pub(crate) fn spec() -> ServiceSpec {
    ServiceSpec {
        key: "sabnzbd".to_string(),
        name: "SABnzbd".to_string(),
        env_prefix: "SABNZBD".to_string(),
        default_url: "https://sabnzbd.bobtail-clownfish.ts.net".to_string(),
        login: None,
        checks: vec![
            Check::Browser {
                name: "main page loads".to_string(),
                session: SessionMode::Fresh,
                steps: vec![Step::goto("/"), Step::expect_title_matches("SABnzbd")],
            },
            Check::Browser {
                name: "queue tab is visible".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("link", "Queue")),
                ],
            },
            Check::Browser {
                name: "history tab is visible".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/"),
                    Step::expect_visible(Locator::role("link", "History")),
                ],
            },
            Check::Browser {
                name: "navigate to config".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/config/"),
                    Step::expect_title_is("SABnzbd Config"),
                    Step::expect_visible(Locator::role("link", "General")),
                ],
            },
            Check::Browser {
                name: "config sections are accessible".to_string(),
                session: SessionMode::Fresh,
                steps: vec![
                    Step::goto("/config/"),
                    Step::expect_visible(Locator::role("link", "Servers")),
                    Step::expect_visible(Locator::role("link", "Categories")),
                    Step::expect_visible(Locator::role("link", "Scheduling")),
                ],
            },
        ],
        quirks: Quirks::default(),
    }
}
