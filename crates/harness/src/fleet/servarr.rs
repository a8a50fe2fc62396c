//! The *arr family: Sonarr, Radarr, Lidarr and Prowlarr
//!
//! All four ship the same login shape: a `/login` form titled
//! `Login - <Name>`, a username textbox accessibly named by its
//! validation message, and a bare `<Name>` title once signed in. Only
//! the landing page and sidebar targets differ.

use smokefleet_common::{
    Check, Locator, LoginFlow, Quirks, ServiceSpec, SessionMode, Step, SuccessCondition,
};

struct Flavor {
    key: &'static str,
    name: &'static str,
    landing_check: &'static str,
    /// Sidebar link asserted visible on the landing page
    landing_link: &'static str,
    /// Match the post-login title as a substring instead of exactly
    /// (Prowlarr decorates its title)
    fuzzy_title: bool,
    /// Sidebar navigation targets and the URL fragment they land on
    nav: [(&'static str, &'static str); 2],
}

pub(crate) fn sonarr() -> ServiceSpec {
    arr_spec(Flavor {
        key: "sonarr",
        name: "Sonarr",
        landing_check: "series page loads after login",
        landing_link: "Series",
        fuzzy_title: false,
        nav: [("Calendar", "/calendar"), ("Wanted", "/wanted")],
    })
}

pub(crate) fn radarr() -> ServiceSpec {
    arr_spec(Flavor {
        key: "radarr",
        name: "Radarr",
        landing_check: "movies page loads after login",
        landing_link: "Movies",
        fuzzy_title: false,
        nav: [("Calendar", "/calendar"), ("Wanted", "/wanted")],
    })
}

pub(crate) fn lidarr() -> ServiceSpec {
    arr_spec(Flavor {
        key: "lidarr",
        name: "Lidarr",
        landing_check: "artists page loads after login",
        landing_link: "Artists",
        fuzzy_title: false,
        nav: [("Calendar", "/calendar"), ("Wanted", "/wanted")],
    })
}

pub(crate) fn prowlarr() -> ServiceSpec {
    arr_spec(Flavor {
        key: "prowlarr",
        name: "Prowlarr",
        landing_check: "indexers page loads after login",
        landing_link: "Indexers",
        fuzzy_title: true,
        nav: [("Search", "/search"), ("History", "/history")],
    })
}

fn arr_spec(flavor: Flavor) -> ServiceSpec {
    let login_title = format!("Login - {}", flavor.name);
    let landing_title = if flavor.fuzzy_title {
        Step::expect_title_matches(flavor.name)
    } else {
        Step::expect_title_is(flavor.name)
    };
    let success = if flavor.fuzzy_title {
        SuccessCondition::TitleMatches { pattern: flavor.name.to_string() }
    } else {
        SuccessCondition::TitleIs { value: flavor.name.to_string() }
    };

    let mut checks = vec![
        Check::Browser {
            name: "login page loads".to_string(),
            session: SessionMode::Fresh,
            steps: vec![
                Step::goto("/login"),
                Step::expect_title_is(&login_title),
                Step::expect_visible(Locator::role("textbox", "User name is required")),
                Step::expect_visible(Locator::role("textbox", "Password")),
                Step::expect_visible(Locator::role("button", "Login")),
            ],
        },
        Check::Browser {
            name: flavor.landing_check.to_string(),
            session: SessionMode::Authenticated,
            steps: vec![
                Step::goto("/"),
                landing_title,
                Step::expect_visible(Locator::role("link", flavor.landing_link)),
            ],
        },
    ];
    for (link, fragment) in flavor.nav {
        checks.push(Check::Browser {
            name: format!("navigate to {}", link),
            session: SessionMode::Authenticated,
            steps: vec![
                Step::goto("/"),
                Step::click(Locator::role("link", link)),
                Step::expect_url(fragment),
            ],
        });
    }
    checks.push(Check::Browser {
        name: "search is available".to_string(),
        session: SessionMode::Authenticated,
        steps: vec![
            Step::goto("/"),
            Step::expect_visible(Locator::role("textbox", "Search")),
        ],
    });

    ServiceSpec {
        key: flavor.key.to_string(),
        name: flavor.name.to_string(),
        env_prefix: flavor.key.to_uppercase(),
        default_url: format!("https://{}.bobtail-clownfish.ts.net", flavor.key),
        login: Some(LoginFlow {
            path: "/login".to_string(),
            ready: vec![Step::expect_title_is(&login_title)],
            username: Locator::role("textbox", "User name is required"),
            password: Locator::role("textbox", "Password"),
            submit: Locator::role("button", "Login"),
            success,
            success_timeout_ms: 5000,
        }),
        checks,
        quirks: Quirks::default(),
    }
}
