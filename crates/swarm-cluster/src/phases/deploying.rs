//! Deploying phase handler.
//!
//! Tokens and the bootstrap secret exist. The cluster waits here until the
//! discovery loop has recorded the declared number of nodes.

use tracing::debug;

use swarm_common::crd::{ClusterState, SwarmCluster};
use swarm_common::Error;

use super::{set_state, StepOutcome};
use crate::controller::Context;

/// Handle a cluster in the Deploying state.
pub async fn handle_deploying(cluster: &SwarmCluster, ctx: &Context) -> Result<StepOutcome, Error> {
    let observed = cluster.observed_nodes();
    let declared = cluster.spec.nodes;

    if observed == declared {
        set_state(cluster, ctx, ClusterState::Provisioning).await?;
    } else {
        debug!(observed, declared, "waiting for nodes to pair");
    }
    Ok(StepOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{KubeClient, MockKubeClient};
    use crate::testing::{capi_owned_cluster, FakeKube};
    use std::sync::Arc;
    use swarm_common::crd::SwarmClusterStatus;

    fn deploying(nodes: u32, observed: u32) -> SwarmCluster {
        let mut cluster = capi_owned_cluster("fleet", "edge", nodes);
        cluster.spec.bootstrap_token = "b".into();
        cluster.spec.network_token = "n".into();
        cluster.status = Some(SwarmClusterStatus {
            state: Some(ClusterState::Deploying),
            nodes: observed,
            ..Default::default()
        });
        cluster
    }

    #[tokio::test]
    async fn story_fewer_nodes_than_declared_keeps_waiting() {
        let mut mock = MockKubeClient::new();
        mock.expect_patch_cluster_status().never();
        let ctx = Context::for_testing(Arc::new(mock));

        let outcome = handle_deploying(&deploying(3, 1), &ctx).await.unwrap();
        assert_eq!(outcome, StepOutcome::Done);
    }

    #[tokio::test]
    async fn story_matching_node_count_moves_to_provisioning() {
        let kube = Arc::new(FakeKube::new());
        kube.insert_cluster(deploying(2, 2));
        let ctx = Context::for_testing(kube.clone());

        let current = kube.cluster("fleet", "edge").unwrap();
        handle_deploying(&current, &ctx).await.unwrap();

        let cluster = kube.cluster("fleet", "edge").unwrap();
        assert_eq!(cluster.state(), Some(ClusterState::Provisioning));
        let conditions = cluster.status.unwrap().conditions;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, super::super::BOOTSTRAPPED_CONDITION);
    }

    #[tokio::test]
    async fn story_zero_node_cluster_provisions_immediately() {
        let kube = Arc::new(FakeKube::new());
        kube.insert_cluster(deploying(0, 0));
        let ctx = Context::for_testing(kube.clone());

        let current = kube.cluster("fleet", "edge").unwrap();
        handle_deploying(&current, &ctx).await.unwrap();

        assert_eq!(
            kube.cluster("fleet", "edge").unwrap().state(),
            Some(ClusterState::Provisioning)
        );
    }

    #[tokio::test]
    async fn story_stale_observation_loses_to_concurrent_writer() {
        let kube = Arc::new(FakeKube::new());
        kube.insert_cluster(deploying(2, 2));
        let ctx = Context::for_testing(kube.clone());

        let stale = kube.cluster("fleet", "edge").unwrap();
        kube.patch_cluster_status(
            "fleet",
            "edge",
            &crate::controller::ClusterStatusPatch::observed_nodes(1),
        )
        .await
        .unwrap();

        let err = handle_deploying(&stale, &ctx).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            kube.cluster("fleet", "edge").unwrap().state(),
            Some(ClusterState::Deploying)
        );
    }
}
