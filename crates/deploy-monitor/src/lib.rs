//! deploy-monitor — polls the HTTP health endpoints of configured deployment
//! environments, diffs the results against the previous run, and alerts only
//! on healthy/unhealthy transitions.

pub mod alert;
pub mod cli;
pub mod detector;
pub mod probe;
pub mod registry;
pub mod runner;
pub mod snapshot;
pub mod store;
