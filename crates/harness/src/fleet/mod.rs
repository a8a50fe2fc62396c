//! Built-in service definitions
//!
//! One module per service (the *arr family shares one); each exposes a
//! `spec()` returning the declarative [`ServiceSpec`] the runner executes.
//! Checks are ordered fresh-first inside every spec: restoring a session
//! writes cookies into the shared browser, so anything that must observe
//! a logged-out page has to run before the first authenticated check.

mod forgejo;
mod grafana;
mod immich;
mod jellyfin;
mod jellyseerr;
mod navidrome;
mod openwebui;
mod sabnzbd;
mod servarr;

use smokefleet_common::ServiceSpec;

/// The full fleet, in registry order
pub fn builtin() -> Vec<ServiceSpec> {
    vec![
        navidrome::spec(),
        grafana::spec(),
        jellyfin::spec(),
        servarr::lidarr(),
        servarr::radarr(),
        servarr::prowlarr(),
        servarr::sonarr(),
        forgejo::spec(),
        openwebui::spec(),
        sabnzbd::spec(),
        jellyseerr::spec(),
        immich::spec(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokefleet_common::{Check, SessionMode};
    use std::collections::HashSet;
    use url::Url;

    #[test]
    fn test_fleet_size() {
        assert_eq!(builtin().len(), 12);
    }

    #[test]
    fn test_keys_and_prefixes_are_unique() {
        let fleet = builtin();
        let keys: HashSet<_> = fleet.iter().map(|s| s.key.as_str()).collect();
        let prefixes: HashSet<_> = fleet.iter().map(|s| s.env_prefix.as_str()).collect();
        assert_eq!(keys.len(), fleet.len());
        assert_eq!(prefixes.len(), fleet.len());
    }

    #[test]
    fn test_keys_are_safe_file_names() {
        for svc in builtin() {
            assert!(
                svc.key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
                "{}: key is used as a snapshot file name",
                svc.key
            );
        }
    }

    #[test]
    fn test_default_urls_parse() {
        for svc in builtin() {
            let url = Url::parse(&svc.default_url)
                .unwrap_or_else(|e| panic!("{}: {}", svc.key, e));
            assert!(matches!(url.scheme(), "http" | "https"), "{}", svc.key);
        }
    }

    #[test]
    fn test_fresh_checks_precede_authenticated_ones() {
        // session restore pollutes browser-wide cookie state
        for svc in builtin() {
            let mut restored = false;
            for check in &svc.checks {
                match check.session() {
                    Some(SessionMode::Authenticated) => restored = true,
                    Some(SessionMode::Fresh) => assert!(
                        !restored,
                        "{}: fresh check '{}' after an authenticated one",
                        svc.key,
                        check.name()
                    ),
                    None => {}
                }
            }
        }
    }

    #[test]
    fn test_authenticated_checks_require_a_login_flow() {
        for svc in builtin() {
            let needs_session = svc
                .checks
                .iter()
                .any(|c| c.session() == Some(SessionMode::Authenticated));
            if needs_session {
                assert!(svc.has_login(), "{}: authenticated checks but no login flow", svc.key);
            }
        }
    }

    #[test]
    fn test_login_flows_are_exercised() {
        for svc in builtin() {
            if svc.has_login() {
                assert!(
                    svc.checks
                        .iter()
                        .any(|c| c.session() == Some(SessionMode::Authenticated)),
                    "{}: login flow but no authenticated check",
                    svc.key
                );
            }
        }
    }

    #[test]
    fn test_check_names_are_unique_per_service() {
        // names become artifact file slugs
        for svc in builtin() {
            let names: HashSet<_> = svc.checks.iter().map(|c| c.name()).collect();
            assert_eq!(names.len(), svc.checks.len(), "{}", svc.key);
        }
    }

    #[test]
    fn test_every_service_has_checks() {
        for svc in builtin() {
            assert!(!svc.checks.is_empty(), "{}", svc.key);
            for check in &svc.checks {
                if let Check::Browser { name, steps, .. } = check {
                    assert!(!steps.is_empty(), "{}: '{}' has no steps", svc.key, name);
                }
            }
        }
    }

    #[test]
    fn test_specs_serialize() {
        for svc in builtin() {
            let json = serde_json::to_string(&svc).unwrap();
            let back: ServiceSpec = serde_json::from_str(&json).unwrap();
            assert_eq!(back.key, svc.key);
            assert_eq!(back.checks.len(), svc.checks.len());
        }
    }
}
