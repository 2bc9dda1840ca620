//! Health snapshot — the complete set of probe results from one monitoring
//! run, assembled with bounded concurrency.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::probe::{Outcome, ProbeResult, Prober, now_unix};
use crate::registry::Registry;

/// All probe results from one run, sorted by (target, path).
///
/// Each (target, path) key appears at most once. The current snapshot is
/// diffed against the previously persisted one, then takes its place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Unix seconds when the run started.
    pub taken_at_utc: u64,
    pub results: Vec<ProbeResult>,
    /// True if the run budget expired before every probe completed.
    #[serde(default)]
    pub degraded: bool,
}

impl HealthSnapshot {
    /// Look up the result for one (target, path) key.
    pub fn get(&self, target: &str, path: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.target == target && r.path == path)
    }

    /// Number of healthy results.
    pub fn healthy_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_healthy()).count()
    }

    /// Number of unhealthy results.
    pub fn unhealthy_count(&self) -> usize {
        self.results.len() - self.healthy_count()
    }
}

/// Probe every endpoint in the registry and assemble one snapshot.
///
/// Probes run concurrently, capped at `max_in_flight` so a struggling
/// backend is not hit by unbounded fan-out. Each probe's outcome is
/// independent: a slow or failing endpoint never hides the others. If the
/// overall `run_budget` expires first, still-outstanding probes are aborted
/// and recorded as timeouts, and the snapshot is marked degraded.
pub async fn take_snapshot(
    registry: &Registry,
    prober: &Prober,
    max_in_flight: usize,
    run_budget: Duration,
) -> HealthSnapshot {
    let taken_at_utc = now_unix();
    let endpoints = registry.endpoints();
    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));

    let mut set = JoinSet::new();
    for endpoint in &endpoints {
        let prober = prober.clone();
        let semaphore = semaphore.clone();
        let endpoint = endpoint.clone();
        set.spawn(async move {
            // Holds the permit for the duration of the probe. The
            // semaphore is never closed, so acquisition cannot fail.
            let _permit = semaphore.acquire_owned().await.ok();
            prober.probe(&endpoint.target, &endpoint.path, &endpoint.url).await
        });
    }

    let mut results: Vec<ProbeResult> = Vec::with_capacity(endpoints.len());
    let drained = tokio::time::timeout(run_budget, async {
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    debug!(
                        target_name = result.target,
                        path = result.path,
                        outcome = ?result.outcome,
                        latency_ms = result.latency_ms,
                        "probe complete"
                    );
                    results.push(result);
                }
                Err(e) => warn!(error = %e, "probe task failed"),
            }
        }
    })
    .await;

    let degraded = drained.is_err();
    if degraded {
        set.abort_all();
        let done: HashSet<(String, String)> =
            results.iter().map(|r| (r.target.clone(), r.path.clone())).collect();
        for endpoint in &endpoints {
            if !done.contains(&(endpoint.target.clone(), endpoint.path.clone())) {
                warn!(
                    target_name = endpoint.target,
                    path = endpoint.path,
                    "run budget exceeded before probe completed"
                );
                results.push(ProbeResult {
                    target: endpoint.target.clone(),
                    path: endpoint.path.clone(),
                    timestamp_utc: now_unix(),
                    outcome: Outcome::Timeout,
                    http_status: None,
                    latency_ms: run_budget.as_millis() as u64,
                    body: None,
                    error: Some("run budget exceeded".to_string()),
                    consecutive_failures: 0,
                });
            }
        }
    }

    results.sort_by(|a, b| (&a.target, &a.path).cmp(&(&b.target, &b.path)));

    HealthSnapshot { taken_at_utc, results, degraded }
}
