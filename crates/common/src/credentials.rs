//! Credential resolution from the environment
//!
//! Each service reads `{PREFIX}_USERNAME` / `{PREFIX}_PASSWORD`, with an
//! optional `{PREFIX}_URL` override for the base URL. Loading a `.env`
//! file is the caller's concern; this module only reads the process
//! environment.

use secrecy::SecretString;
use std::env;

use crate::error::{Error, Result};

/// Login credentials for one service
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    /// Redacted in Debug output; read with `secrecy::ExposeSecret`
    pub password: SecretString,
}

impl Credentials {
    /// Read `{prefix}_USERNAME` and `{prefix}_PASSWORD`, treating empty
    /// values as unset
    pub fn from_env(prefix: &str) -> Result<Self> {
        let username = non_empty_var(&format!("{}_USERNAME", prefix));
        let password = non_empty_var(&format!("{}_PASSWORD", prefix));
        match (username, password) {
            (Some(username), Some(password)) => {
                Ok(Credentials { username, password: SecretString::from(password) })
            }
            _ => Err(Error::MissingCredentials { prefix: prefix.to_string() }),
        }
    }

    /// Whether both credential variables are set, without constructing
    pub fn available(prefix: &str) -> bool {
        Self::from_env(prefix).is_ok()
    }
}

/// Base URL override from `{prefix}_URL`, if set
pub fn url_from_env(prefix: &str) -> Option<String> {
    non_empty_var(&format!("{}_URL", prefix))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    // each test uses its own prefix so parallel tests never share variables

    #[test]
    fn test_from_env_present() {
        env::set_var("CREDTESTA_USERNAME", "smoketest");
        env::set_var("CREDTESTA_PASSWORD", "hunter2");

        let creds = Credentials::from_env("CREDTESTA").unwrap();
        assert_eq!(creds.username, "smoketest");
        assert_eq!(creds.password.expose_secret(), "hunter2");
        assert!(Credentials::available("CREDTESTA"));
    }

    #[test]
    fn test_from_env_missing_names_both_variables() {
        env::remove_var("CREDTESTB_USERNAME");
        env::remove_var("CREDTESTB_PASSWORD");

        let err = Credentials::from_env("CREDTESTB").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CREDTESTB_USERNAME"));
        assert!(msg.contains("CREDTESTB_PASSWORD"));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        env::set_var("CREDTESTC_USERNAME", "smoketest");
        env::set_var("CREDTESTC_PASSWORD", "   ");

        assert!(Credentials::from_env("CREDTESTC").is_err());
    }

    #[test]
    fn test_debug_never_prints_password() {
        env::set_var("CREDTESTD_USERNAME", "smoketest");
        env::set_var("CREDTESTD_PASSWORD", "hunter2");

        let creds = Credentials::from_env("CREDTESTD").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_url_override() {
        env::remove_var("CREDTESTE_URL");
        assert_eq!(url_from_env("CREDTESTE"), None);

        env::set_var("CREDTESTE_URL", "http://localhost:8096");
        assert_eq!(url_from_env("CREDTESTE").as_deref(), Some("http://localhost:8096"));
    }
}
