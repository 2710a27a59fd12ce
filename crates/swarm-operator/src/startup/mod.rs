//! Startup utilities for the swarm operator
//!
//! This module contains all startup and initialization logic extracted from main.rs.

mod capi_kinds;
mod crds;
mod signals;

pub use capi_kinds::resolve_capi_kinds;
pub use crds::{crd_manifests, ensure_crds_installed};
pub use signals::cancel_on_signal;
