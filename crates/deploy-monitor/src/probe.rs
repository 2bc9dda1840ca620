//! HTTP prober — performs a single health check attempt with a bounded
//! retry budget and returns the outcome as data.
//!
//! Expected failure modes (HTTP errors, unreachable hosts, timeouts) never
//! surface as `Err`; they become [`Outcome`] variants so that one bad
//! endpoint is just another row in the snapshot.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Classification of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// HTTP 2xx.
    Success,
    /// HTTP response with a non-2xx status. Definitive, never retried.
    HttpError,
    /// Connection refused, DNS failure, or any other transport error.
    NetworkError,
    /// No response within the per-probe timeout.
    Timeout,
}

/// The result of probing one (target, path) endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: String,
    pub path: String,
    /// Unix seconds when the probe completed.
    pub timestamp_utc: u64,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub latency_ms: u64,
    /// Parsed JSON body on success, for diagnostic display only.
    /// Not persisted in the snapshot file.
    #[serde(skip)]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of consecutive runs this endpoint has been failing,
    /// including this one. Maintained by the detector, not the prober.
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl ProbeResult {
    /// Success and only success counts as healthy.
    pub fn is_healthy(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Delay between retry attempts. The polling interval is the primary
/// backoff mechanism; this only avoids hammering a flapping connection.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// HTTP prober with a shared client, per-probe timeout, and retry budget.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl Prober {
    /// Create a prober. The timeout must be non-zero; retries only apply
    /// to transport failures, never to definitive HTTP error responses.
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        if timeout.is_zero() {
            bail!("probe timeout must be greater than zero");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout, max_retries, retry_delay: RETRY_DELAY })
    }

    /// Probe one endpoint, retrying transport failures up to the budget.
    pub async fn probe(&self, target: &str, path: &str, url: &Url) -> ProbeResult {
        let mut attempt = 0;
        loop {
            let result = self.attempt(target, path, url).await;
            match result.outcome {
                Outcome::NetworkError | Outcome::Timeout if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(
                        target_name = target,
                        path,
                        attempt,
                        outcome = ?result.outcome,
                        "probe failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                _ => return result,
            }
        }
    }

    /// One probe attempt, classified.
    async fn attempt(&self, target: &str, path: &str, url: &Url) -> ProbeResult {
        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(res) => {
                let status = res.status();
                if status.is_success() {
                    // Body is optional diagnostics; a non-JSON body is fine.
                    let body = res.json::<serde_json::Value>().await.ok();
                    self.result(target, path, Outcome::Success, Some(status.as_u16()), latency_ms, body, None)
                } else {
                    self.result(
                        target,
                        path,
                        Outcome::HttpError,
                        Some(status.as_u16()),
                        latency_ms,
                        None,
                        Some(format!("HTTP {status}")),
                    )
                }
            }
            Err(e) if e.is_timeout() => self.result(
                target,
                path,
                Outcome::Timeout,
                None,
                latency_ms,
                None,
                Some(format!("timeout after {}ms", self.timeout.as_millis())),
            ),
            Err(e) => self.result(
                target,
                path,
                Outcome::NetworkError,
                None,
                latency_ms,
                None,
                Some(e.to_string()),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn result(
        &self,
        target: &str,
        path: &str,
        outcome: Outcome,
        http_status: Option<u16>,
        latency_ms: u64,
        body: Option<serde_json::Value>,
        error: Option<String>,
    ) -> ProbeResult {
        ProbeResult {
            target: target.to_string(),
            path: path.to_string(),
            timestamp_utc: now_unix(),
            outcome,
            http_status,
            latency_ms,
            body,
            error,
            consecutive_failures: 0,
        }
    }
}

/// Current time as Unix seconds.
pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

    use axum::{Router, extract::State, http::StatusCode, routing::get};

    /// Start a test server whose /api/health status code can be flipped
    /// through the returned handle.
    async fn start_server() -> (SocketAddr, Arc<AtomicU16>) {
        let status = Arc::new(AtomicU16::new(200));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = status.clone();
        tokio::spawn(async move {
            let app = Router::new()
                .route(
                    "/api/health",
                    get(|State(status): State<Arc<AtomicU16>>| async move {
                        let code = StatusCode::from_u16(status.load(Ordering::Relaxed)).unwrap();
                        (code, r#"{"status":"ok","environment":"test"}"#)
                    }),
                )
                .with_state(state);
            axum::serve(listener, app).await.unwrap();
        });

        (addr, status)
    }

    fn url(addr: SocketAddr, path: &str) -> Url {
        format!("http://{addr}{path}").parse().unwrap()
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(Prober::new(Duration::ZERO, 0).is_err());
    }

    #[test]
    fn only_success_is_healthy() {
        let mut result = ProbeResult {
            target: "t".into(),
            path: "/p".into(),
            timestamp_utc: 0,
            outcome: Outcome::Success,
            http_status: Some(200),
            latency_ms: 1,
            body: None,
            error: None,
            consecutive_failures: 0,
        };
        assert!(result.is_healthy());
        for outcome in [Outcome::HttpError, Outcome::NetworkError, Outcome::Timeout] {
            result.outcome = outcome;
            assert!(!result.is_healthy());
        }
    }

    #[tokio::test]
    async fn probes_2xx_as_success() {
        let (addr, _status) = start_server().await;
        let prober = Prober::new(Duration::from_secs(2), 0).unwrap();

        let result = prober.probe("test", "/api/health", &url(addr, "/api/health")).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.http_status, Some(200));
        assert_eq!(result.body.unwrap()["status"], "ok");
    }

    #[tokio::test]
    async fn probes_5xx_as_http_error() {
        let (addr, status) = start_server().await;
        status.store(503, Ordering::Relaxed);
        let prober = Prober::new(Duration::from_secs(2), 0).unwrap();

        let result = prober.probe("test", "/api/health", &url(addr, "/api/health")).await;
        assert_eq!(result.outcome, Outcome::HttpError);
        assert_eq!(result.http_status, Some(503));
        assert!(result.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn probes_dead_port_as_network_error() {
        // Bind a port, grab the address, and drop the listener so nothing
        // is listening there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = Prober::new(Duration::from_secs(2), 0).unwrap();
        let result = prober.probe("dead", "/api/health", &url(addr, "/api/health")).await;
        assert!(matches!(result.outcome, Outcome::NetworkError | Outcome::Timeout));
        assert!(result.http_status.is_none());
    }

    #[tokio::test]
    async fn does_not_retry_http_errors() {
        let hits = Arc::new(AtomicU32::new(0));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let counter = hits.clone();
        tokio::spawn(async move {
            let app = Router::new()
                .route(
                    "/api/health",
                    get(|State(hits): State<Arc<AtomicU32>>| async move {
                        hits.fetch_add(1, Ordering::Relaxed);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }),
                )
                .with_state(counter);
            axum::serve(listener, app).await.unwrap();
        });

        let prober = Prober::new(Duration::from_secs(2), 3).unwrap();
        let result = prober.probe("test", "/api/health", &url(addr, "/api/health")).await;
        assert_eq!(result.outcome, Outcome::HttpError);
        // An HTTP error is a definitive answer: exactly one request.
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn tolerates_non_json_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = Router::new().route("/api/health", get(|| async { "plain OK" }));
            axum::serve(listener, app).await.unwrap();
        });

        let prober = Prober::new(Duration::from_secs(2), 0).unwrap();
        let result = prober.probe("test", "/api/health", &url(addr, "/api/health")).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.body.is_none());
    }
}
