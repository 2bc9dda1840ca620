//! Failure-transition detector — diffs the current snapshot against the
//! previous one and emits a transition only when an endpoint's
//! healthy/unhealthy classification actually changed.
//!
//! Steady-state failure produces nothing after the first transition, which
//! is what keeps a persistent outage from becoming an alert storm. A key
//! with no previous entry establishes a baseline and emits nothing.

use serde::{Deserialize, Serialize};

use crate::probe::ProbeResult;
use crate::snapshot::HealthSnapshot;

/// Binary health classification. There is deliberately no partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
}

/// Classify a probe result: success is healthy, everything else is not.
pub fn classify(result: &ProbeResult) -> Health {
    if result.is_healthy() { Health::Healthy } else { Health::Unhealthy }
}

/// A change in classification for one (target, path) key between two
/// consecutive snapshots. Ephemeral: consumed by the alert sinks and never
/// persisted beyond logs.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub target: String,
    pub path: String,
    pub from: Health,
    pub to: Health,
    pub occurred_at_utc: u64,
    pub detail: String,
}

/// Transition detector with a configurable failure threshold.
///
/// With the default threshold of 1 every raw classification flip is a
/// transition. A higher threshold requires that many consecutive failing
/// runs before an endpoint is reported down, for endpoints that flap.
/// Recovery always reports on the first healthy run.
#[derive(Debug, Clone)]
pub struct Detector {
    failure_threshold: u32,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Detector {
    /// A threshold of 0 makes no sense; it is clamped to 1.
    pub fn new(failure_threshold: u32) -> Self {
        Self { failure_threshold: failure_threshold.max(1) }
    }

    /// Effective classification once the failure streak is applied.
    fn effective(&self, result: &ProbeResult) -> Health {
        if result.consecutive_failures >= self.failure_threshold {
            Health::Unhealthy
        } else {
            Health::Healthy
        }
    }

    /// Diff `current` against `previous`, updating each current result's
    /// failure streak and returning the transitions in snapshot order
    /// (sorted by target, then path — deterministic).
    ///
    /// `previous = None` is the first run: baseline only, zero transitions.
    pub fn diff(
        &self,
        current: &mut HealthSnapshot,
        previous: Option<&HealthSnapshot>,
    ) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for result in &mut current.results {
            let prior = previous.and_then(|p| p.get(&result.target, &result.path));

            result.consecutive_failures = match classify(result) {
                Health::Healthy => 0,
                Health::Unhealthy => {
                    prior.map_or(0, |p| p.consecutive_failures).saturating_add(1)
                }
            };

            let Some(prior) = prior else {
                // New key or empty baseline: nothing to compare against.
                continue;
            };

            let before = self.effective(prior);
            let after = self.effective(result);
            if before != after {
                transitions.push(Transition {
                    target: result.target.clone(),
                    path: result.path.clone(),
                    from: before,
                    to: after,
                    occurred_at_utc: result.timestamp_utc,
                    detail: detail_for(result),
                });
            }
        }

        transitions
    }
}

/// Human-readable one-liner describing the result that caused a transition.
fn detail_for(result: &ProbeResult) -> String {
    match (result.http_status, &result.error) {
        (Some(status), _) if result.is_healthy() => {
            format!("HTTP {status} in {}ms", result.latency_ms)
        }
        (Some(status), _) => format!("HTTP {status}"),
        (None, Some(error)) => error.clone(),
        (None, None) => format!("{:?}", result.outcome),
    }
}
