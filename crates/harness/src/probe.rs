//! Reachability probing and plain HTTP checks
//!
//! Before spending a browser on a service, a cheap HTTP probe decides
//! whether the service is up at all. Any HTTP response counts: an auth
//! wall or a redirect still proves something is listening. Only
//! connection-level failures keep retrying until the probe window runs
//! out, after which the service's checks are skipped instead of failed.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::{HarnessError, HarnessResult};
use crate::executor;

const PROBE_INTERVAL: Duration = Duration::from_millis(500);
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared HTTP prober for the whole run
pub struct Prober {
    client: Client,
    window: Duration,
}

/// Result of probing one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub attempts: usize,
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Prober {
    pub fn new(window: Duration, ignore_https_errors: bool) -> HarnessResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(ignore_https_errors)
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(Self { client, window })
    }

    pub async fn probe(&self, url: &Url) -> ProbeOutcome {
        let start = Instant::now();
        let deadline = start + self.window;
        let mut attempts = 0;
        let mut last_error = String::new();
        loop {
            attempts += 1;
            match self.client.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    debug!("probe {} -> {} (attempt {})", url, status, attempts);
                    return ProbeOutcome {
                        reachable: true,
                        attempts,
                        status: Some(status),
                        error: None,
                        duration_ms: elapsed_ms(start),
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            if Instant::now() >= deadline {
                warn!("probe {} failed after {} attempts: {}", url, attempts, last_error);
                return ProbeOutcome {
                    reachable: false,
                    attempts,
                    status: None,
                    error: Some(last_error),
                    duration_ms: elapsed_ms(start),
                };
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// Run an HTTP check: status assertion plus an optional JSON-pointer
    /// equality assertion against the response body
    pub async fn http_check(
        &self,
        base: &Url,
        path: &str,
        expect_status: u16,
        expect_json: Option<&(String, String)>,
    ) -> HarnessResult<()> {
        let url = executor::resolve_url(base, path)?;
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status().as_u16();
        if status != expect_status {
            return Err(HarnessError::AssertionFailed(format!(
                "GET {}: expected status {}, got {}",
                url, expect_status, status
            )));
        }
        if let Some((pointer, want)) = expect_json {
            let body: serde_json::Value = resp.json().await?;
            let got = body.pointer(pointer);
            let matched = match got {
                Some(serde_json::Value::String(s)) => s == want,
                Some(v) => v.to_string() == *want,
                None => false,
            };
            if !matched {
                let shown =
                    got.map(|v| v.to_string()).unwrap_or_else(|| "missing".to_string());
                return Err(HarnessError::AssertionFailed(format!(
                    "GET {}: {} = {} (expected {:?})",
                    url, pointer, shown, want
                )));
            }
        }
        Ok(())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober(window_ms: u64) -> Prober {
        Prober::new(Duration::from_millis(window_ms), true).unwrap()
    }

    #[tokio::test]
    async fn test_probe_healthy_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(200).create_async().await;

        let url = Url::parse(&server.url()).unwrap();
        let outcome = prober(2000).probe(&url).await;

        assert!(outcome.reachable);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.attempts, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_auth_wall_is_reachable() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/").with_status(401).create_async().await;

        let url = Url::parse(&server.url()).unwrap();
        let outcome = prober(2000).probe(&url).await;

        assert!(outcome.reachable);
        assert_eq!(outcome.status, Some(401));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_retries_then_gives_up() {
        // nothing listens on the port once the listener is dropped; a
        // pooled mockito server would keep its port open for the whole
        // test process
        let url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
        };

        let outcome = prober(1200).probe(&url).await;

        assert!(!outcome.reachable);
        assert!(outcome.attempts >= 2);
        assert!(outcome.status.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_http_check_json_pointer() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"commit":"abc","database":"ok","version":"12.0.0"}"#)
            .create_async()
            .await;

        let base = Url::parse(&server.url()).unwrap();
        let p = prober(2000);

        let pointer = ("/database".to_string(), "ok".to_string());
        p.http_check(&base, "/api/health", 200, Some(&pointer)).await.unwrap();

        let wrong = ("/database".to_string(), "down".to_string());
        let err = p.http_check(&base, "/api/health", 200, Some(&wrong)).await.unwrap_err();
        assert!(matches!(err, HarnessError::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn test_http_check_status_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/api/health").with_status(503).create_async().await;

        let base = Url::parse(&server.url()).unwrap();
        let err = prober(2000).http_check(&base, "/api/health", 200, None).await.unwrap_err();
        match err {
            HarnessError::AssertionFailed(msg) => {
                assert!(msg.contains("expected status 200"));
                assert!(msg.contains("503"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
