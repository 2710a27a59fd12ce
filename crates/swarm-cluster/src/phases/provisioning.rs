//! Provisioning phase handler.
//!
//! Provisioning is terminal for the bootstrap state machine. Machines for
//! paired nodes are created by the discovery loop, so the controller only
//! records that it looked.

use kube::ResourceExt;
use tracing::debug;

use swarm_common::crd::SwarmCluster;
use swarm_common::Error;

use super::StepOutcome;
use crate::controller::Context;

/// Handle a cluster in the Provisioning state.
pub async fn handle_provisioning(
    cluster: &SwarmCluster,
    _ctx: &Context,
) -> Result<StepOutcome, Error> {
    debug!(
        cluster = %cluster.name_any(),
        observed = cluster.observed_nodes(),
        declared = cluster.spec.nodes,
        "cluster provisioning"
    );
    Ok(StepOutcome::Done)
}
