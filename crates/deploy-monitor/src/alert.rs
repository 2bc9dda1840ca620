//! Alert sinks — render transition events to operator-visible channels.
//!
//! Sinks are fire-and-forget: a sink that cannot deliver logs its own
//! failure and swallows it, so a broken alerting channel never aborts or
//! masks the monitoring run that produced the event.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, warn};
use url::Url;

use crate::detector::{Health, Transition};

/// Alert severity. Failures are critical; recoveries are informational,
/// rendered so they can never be mistaken for a new failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// A rendered alert, ready for delivery. Ephemeral; not durable state.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub severity: Severity,
    pub message: String,
    pub transition: Transition,
}

impl AlertEvent {
    pub fn new(transition: Transition) -> Self {
        let (severity, message) = match transition.to {
            Health::Unhealthy => (
                Severity::Critical,
                format!(
                    "{} {} is DOWN ({})",
                    transition.target, transition.path, transition.detail
                ),
            ),
            Health::Healthy => (
                Severity::Warning,
                format!(
                    "{} {} RECOVERED ({})",
                    transition.target, transition.path, transition.detail
                ),
            ),
        };
        Self { severity, message, transition }
    }
}

/// Delivery channel for alert events.
///
/// The detector knows nothing about rendering; adding a channel means
/// adding an implementation here, not touching detection logic.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one event. Must not return an error and must not panic;
    /// delivery failures are logged inside the sink.
    async fn emit(&self, event: &AlertEvent);
}

/// Renders alerts to the log stream.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl AlertSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn emit(&self, event: &AlertEvent) {
        match event.severity {
            Severity::Critical => error!(
                target_name = event.transition.target,
                path = event.transition.path,
                detail = event.transition.detail,
                "ALERT: {}",
                event.message
            ),
            Severity::Warning => warn!(
                target_name = event.transition.target,
                path = event.transition.path,
                detail = event.transition.detail,
                "ALERT: {}",
                event.message
            ),
        }
    }
}

/// Appends each event as one JSON document per line, for audit.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AlertSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "json-lines"
    }

    async fn emit(&self, event: &AlertEvent) {
        let line = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "cannot serialize alert event");
                return;
            }
        };

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                use std::io::Write;
                writeln!(file, "{line}")
            });

        if let Err(e) = result {
            error!(path = %self.path.display(), error = %e, "cannot append to alert log");
        }
    }
}

/// POSTs each event as JSON to a webhook URL.
#[derive(Debug)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: Url) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn emit(&self, event: &AlertEvent) {
        let response = self.client.post(self.url.clone()).json(event).send().await;
        match response {
            Ok(res) if !res.status().is_success() => {
                error!(status = %res.status(), "webhook rejected alert");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "webhook delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(to: Health) -> Transition {
        Transition {
            target: "staging".into(),
            path: "/api/health".into(),
            from: match to {
                Health::Healthy => Health::Unhealthy,
                Health::Unhealthy => Health::Healthy,
            },
            to,
            occurred_at_utc: 1_700_000_000,
            detail: "HTTP 503".into(),
        }
    }

    #[test]
    fn going_down_is_critical() {
        let event = AlertEvent::new(transition(Health::Unhealthy));
        assert_eq!(event.severity, Severity::Critical);
        assert!(event.message.contains("DOWN"));
        assert!(!event.message.contains("RECOVERED"));
    }

    #[test]
    fn recovery_is_warning_and_reads_as_recovery() {
        let event = AlertEvent::new(transition(Health::Healthy));
        assert_eq!(event.severity, Severity::Warning);
        assert!(event.message.contains("RECOVERED"));
        assert!(!event.message.contains("DOWN"));
    }

    #[tokio::test]
    async fn json_lines_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.emit(&AlertEvent::new(transition(Health::Unhealthy))).await;
        sink.emit(&AlertEvent::new(transition(Health::Healthy))).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["severity"], "critical");
        assert_eq!(first["transition"]["target"], "staging");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["severity"], "warning");
    }

    #[tokio::test]
    async fn json_lines_sink_swallows_io_errors() {
        // A directory path cannot be opened for append; emit must not panic.
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path());
        sink.emit(&AlertEvent::new(transition(Health::Unhealthy))).await;
    }

    #[tokio::test]
    async fn webhook_sink_swallows_delivery_failures() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = WebhookSink::new(format!("http://{addr}/hook").parse().unwrap());
        // Nothing listening: must log and return, not panic or error.
        sink.emit(&AlertEvent::new(transition(Health::Unhealthy))).await;
    }
}
