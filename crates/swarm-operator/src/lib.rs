//! Swarm operator: Cluster API infrastructure provider for self-pairing nodes

#![deny(missing_docs)]

/// Command line and environment configuration
pub mod config;
/// Controller and background loop wiring
pub mod controller_runner;
/// Startup utilities (CRD install, Cluster API kinds, signals)
pub mod startup;
