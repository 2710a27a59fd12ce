//! Custom Resource Definitions for swarm

mod capi;
mod cluster;
mod machine;
mod types;

pub use capi::{
    CapiBootstrap, CapiKinds, CapiMachine, CapiMachineSpec, CAPI_CLUSTER_KIND,
    CAPI_FALLBACK_VERSION, CAPI_GROUP, CAPI_MACHINE_KIND,
};
pub use cluster::{SwarmCluster, SwarmClusterSpec, SwarmClusterStatus};
pub use machine::{control_secret_name, machine_name, SwarmMachine, SwarmMachineSpec};
pub use types::{set_condition, ClusterState, Condition, ConditionStatus};
