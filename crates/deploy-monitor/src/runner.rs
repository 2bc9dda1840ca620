//! Scheduler/runner — drives the probe → diff → alert → persist pipeline,
//! either once (CI/CD gate) or on a fixed interval.

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::alert::{AlertEvent, AlertSink};
use crate::detector::Detector;
use crate::probe::Prober;
use crate::registry::Registry;
use crate::snapshot::take_snapshot;
use crate::store::SnapshotStore;

/// Outcome of one monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub healthy: usize,
    pub unhealthy: usize,
    pub transitions: usize,
    /// True if the run budget expired before all probes completed.
    pub degraded: bool,
}

impl RunSummary {
    /// Exit code for CI/CD gating: 0 when everything is healthy, 1 when
    /// anything is not. (Code 2 — the monitor itself faulted — is produced
    /// by `main` when a run cannot start at all.)
    pub fn exit_code(&self) -> u8 {
        if self.unhealthy == 0 { 0 } else { 1 }
    }
}

/// Wires the registry, prober, store, detector, and sinks into a pipeline.
pub struct Runner {
    registry: Registry,
    prober: Prober,
    store: SnapshotStore,
    detector: Detector,
    sinks: Vec<Box<dyn AlertSink>>,
    max_in_flight: usize,
    run_budget: Duration,
}

impl Runner {
    pub fn new(
        registry: Registry,
        prober: Prober,
        store: SnapshotStore,
        detector: Detector,
        sinks: Vec<Box<dyn AlertSink>>,
        max_in_flight: usize,
        run_budget: Duration,
    ) -> Self {
        Self { registry, prober, store, detector, sinks, max_in_flight, run_budget }
    }

    /// Execute one full monitoring pass and return its summary.
    ///
    /// Snapshot persistence is best-effort: a save failure is logged and
    /// the run still succeeds, so the next run diffs against stale data
    /// instead of nothing.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let mut current =
            take_snapshot(&self.registry, &self.prober, self.max_in_flight, self.run_budget).await;
        let previous = self.store.load_previous();

        let transitions = self.detector.diff(&mut current, previous.as_ref());
        let events: Vec<AlertEvent> = transitions.into_iter().map(AlertEvent::new).collect();

        for event in &events {
            for sink in &self.sinks {
                sink.emit(event).await;
            }
        }

        if let Err(e) = self.store.save(&current) {
            warn!(
                path = %self.store.path().display(),
                error = %e,
                "cannot persist snapshot, next run will compare against stale data"
            );
        }

        let summary = RunSummary {
            healthy: current.healthy_count(),
            unhealthy: current.unhealthy_count(),
            transitions: events.len(),
            degraded: current.degraded,
        };

        info!(
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            transitions = summary.transitions,
            degraded = summary.degraded,
            "run complete"
        );

        Ok(summary)
    }

    /// Run at a fixed interval until the token is cancelled.
    ///
    /// The first pass fires immediately. Runs never overlap: the loop
    /// awaits each pass inline, and a tick that comes due mid-run is
    /// skipped rather than queued.
    pub async fn run_forever(&self, poll_interval: Duration, cancel: CancellationToken) {
        info!(
            poll_interval_ms = poll_interval.as_millis(),
            targets = self.registry.targets().len(),
            "starting watch loop"
        );

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("watch loop cancelled");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "monitoring run failed");
                    }
                }
            }
        }
    }
}
