//! Environment registry — the static set of deployment targets to monitor.
//!
//! Loaded once at startup from a TOML file and never mutated afterwards.
//! A malformed registry is an operator error: loading fails hard instead of
//! monitoring a partial target list.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

/// One monitored environment (e.g. staging, production).
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentTarget {
    /// Unique name, used as the alert/snapshot key.
    pub name: String,
    /// Base URL of the backend serving the health endpoints.
    pub backend_url: Url,
    /// Base URL of the frontend, for display only.
    #[serde(default)]
    pub frontend_url: Option<Url>,
    /// Health check paths probed on the backend, e.g. `/api/health`.
    pub health_paths: Vec<String>,
}

/// Immutable registry of all monitored targets, in declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    targets: Vec<EnvironmentTarget>,
}

impl Registry {
    /// Load the registry from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry file: {}", path.display()))?;
        Self::parse(&contents)
    }

    /// Parse and validate a registry from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut registry: Self =
            toml::from_str(contents).context("failed to parse registry TOML")?;

        if registry.targets.is_empty() {
            bail!("registry must define at least one target");
        }

        let mut seen = std::collections::HashSet::new();
        for target in &mut registry.targets {
            if target.name.trim().is_empty() {
                bail!("target name must not be empty");
            }
            if !seen.insert(target.name.clone()) {
                bail!("duplicate target name: {}", target.name);
            }
            if target.health_paths.is_empty() {
                bail!("target {} must define at least one health path", target.name);
            }
            let mut seen_paths = std::collections::HashSet::new();
            for path in &mut target.health_paths {
                if !path.starts_with('/') {
                    *path = format!("/{path}");
                }
                if !seen_paths.insert(path.clone()) {
                    bail!("target {} lists health path {} twice", target.name, path);
                }
            }
        }

        Ok(registry)
    }

    /// All targets, in declaration order.
    pub fn targets(&self) -> &[EnvironmentTarget] {
        &self.targets
    }

    /// Look up a target by name.
    pub fn get(&self, name: &str) -> Option<&EnvironmentTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Every (target name, path, full probe URL) triple across the registry.
    ///
    /// Targets with a base URL that cannot absorb one of its paths are
    /// logged and skipped rather than aborting the run.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for target in &self.targets {
            for path in &target.health_paths {
                match target.backend_url.join(path) {
                    Ok(url) => endpoints.push(Endpoint {
                        target: target.name.clone(),
                        path: path.clone(),
                        url,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            target_name = target.name,
                            path,
                            error = %e,
                            "cannot build probe URL, skipping endpoint"
                        );
                    }
                }
            }
        }
        endpoints
    }
}

/// A single probeable (target, path) pair with its resolved URL.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub target: String,
    pub path: String,
    pub url: Url,
}
