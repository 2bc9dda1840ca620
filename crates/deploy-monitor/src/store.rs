//! Snapshot store — persists the latest snapshot to a single JSON file.
//!
//! Only the previous snapshot is retained; there is no history. Loading is
//! forgiving (a missing or corrupt file just means "no baseline yet"), but
//! saving is atomic so a crash mid-write can never leave a partial file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::snapshot::HealthSnapshot;

/// File-backed store for the last known snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previously persisted snapshot.
    ///
    /// A missing file is the normal first-run case and returns `None`
    /// silently; a corrupt file also returns `None` but logs a warning.
    /// Either way the next diff establishes a fresh baseline.
    pub fn load_previous(&self) -> Option<HealthSnapshot> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read snapshot file");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot file is corrupt, treating as empty"
                );
                None
            }
        }
    }

    /// Persist the snapshot atomically: write a sibling temp file, then
    /// rename it over the target.
    pub fn save(&self, snapshot: &HealthSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create snapshot dir {}", parent.display()))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("write snapshot temp file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename snapshot into {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Outcome, ProbeResult};

    fn sample_snapshot() -> HealthSnapshot {
        HealthSnapshot {
            taken_at_utc: 1_700_000_000,
            results: vec![ProbeResult {
                target: "staging".into(),
                path: "/api/health".into(),
                timestamp_utc: 1_700_000_000,
                outcome: Outcome::HttpError,
                http_status: Some(503),
                latency_ms: 42,
                body: None,
                error: Some("HTTP 503 Service Unavailable".into()),
                consecutive_failures: 2,
            }],
            degraded: false,
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state.json"));
        assert!(store.load_previous().is_none());
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SnapshotStore::new(path);
        assert!(store.load_previous().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state.json"));

        store.save(&sample_snapshot()).unwrap();
        let loaded = store.load_previous().unwrap();

        assert_eq!(loaded.taken_at_utc, 1_700_000_000);
        let result = loaded.get("staging", "/api/health").unwrap();
        assert_eq!(result.outcome, Outcome::HttpError);
        assert_eq!(result.http_status, Some(503));
        assert_eq!(result.consecutive_failures, 2);
    }

    #[test]
    fn save_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested/dir/state.json"));
        store.save(&sample_snapshot()).unwrap();
        assert!(store.load_previous().is_some());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state.json"));
        store.save(&sample_snapshot()).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["state.json"]);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("state.json"));

        store.save(&sample_snapshot()).unwrap();
        let mut second = sample_snapshot();
        second.taken_at_utc = 1_700_000_060;
        store.save(&second).unwrap();

        assert_eq!(store.load_previous().unwrap().taken_at_utc, 1_700_000_060);
    }
}
