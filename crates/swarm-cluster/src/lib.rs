//! Cluster lifecycle management for swarm
//!
//! This crate provides the controllers for SwarmCluster and SwarmMachine
//! CRDs and the two background loops that discover paired nodes and announce
//! registration payloads to nodes that have not paired yet.
//!
//! Related crates:
//! - `swarm-ledger`: pairing tokens and ledger sessions
//! - `swarm-common`: CRDs, errors and shared utilities

pub mod controller;
pub mod discovery_loop;
pub mod machine_controller;
pub mod materializer;
pub mod phases;
pub mod registration_loop;
pub mod scheduler;
pub mod secrets;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

// Re-export controller types
pub use controller::{
    error_policy, reconcile, ClusterSpecPatch, ClusterStatusPatch, Context, ContextBuilder,
    KubeClient, KubeClientImpl,
};
pub use discovery_loop::{NodeWatcher, WATCH_NODES};
pub use machine_controller::{machine_error_policy, reconcile_machine};
pub use materializer::{MachineMaterializer, Materialized};
pub use phases::StepOutcome;
pub use registration_loop::{NodeRegistrationLoop, REGISTER_NODES};
pub use scheduler::{ResyncHandle, ResyncScheduler, MIN_PERIOD, WAKE_QUEUE_DEPTH};
pub use secrets::SecretProvisioner;
pub use sweep::LoopConfig;

// Re-export common error types
pub use swarm_common::{Error, Result};
