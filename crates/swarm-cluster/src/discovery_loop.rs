//! Node discovery loop
//!
//! On every resync, each cluster that has fewer (or more) observed nodes than
//! declared is looked up in its pairing ledger. The node count seen there is
//! written to the cluster status and every discovered node is materialized.

use std::sync::Arc;

use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use swarm_common::crd::SwarmCluster;
use swarm_common::events::{actions, reasons, EventPublisher};
use swarm_common::Error;
use swarm_ledger::NodeDiscovery;

use crate::controller::{ClusterStatusPatch, KubeClient};
use crate::materializer::MachineMaterializer;
use crate::sweep::{target_clusters, wants_nodes, LoopConfig};

/// Name of the discovery loop in logs
pub const WATCH_NODES: &str = "watch-nodes";

/// Records discovered nodes and materializes their machines
pub struct NodeWatcher {
    kube: Arc<dyn KubeClient>,
    discovery: Arc<dyn NodeDiscovery>,
    events: Arc<dyn EventPublisher>,
    config: LoopConfig,
}

impl NodeWatcher {
    /// Create a watcher
    pub fn new(
        kube: Arc<dyn KubeClient>,
        discovery: Arc<dyn NodeDiscovery>,
        events: Arc<dyn EventPublisher>,
        config: LoopConfig,
    ) -> Self {
        Self {
            kube,
            discovery,
            events,
            config,
        }
    }

    /// One pass over every cluster still waiting for nodes.
    ///
    /// Failures are isolated per cluster; only cancellation and listing
    /// failures end the pass early.
    pub async fn resync(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let clusters = target_clusters(self.kube.as_ref(), &self.config).await?;
        for cluster in clusters.iter().filter(|c| wants_nodes(c)) {
            if cancel.is_cancelled() {
                return Err(Error::cancelled(WATCH_NODES));
            }
            match self.sync_cluster(cluster, cancel).await {
                Ok(()) => {}
                Err(e @ Error::Cancelled { .. }) => return Err(e),
                Err(e) => warn!(
                    cluster = %cluster.name_any(),
                    error = %e,
                    "node discovery failed, retrying next cycle"
                ),
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(cluster = %cluster.name_any()))]
    async fn sync_cluster(
        &self,
        cluster: &SwarmCluster,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let name = cluster.name_any();
        let namespace = cluster
            .namespace()
            .ok_or_else(|| Error::validation_for(&name, "SwarmCluster must be namespaced"))?;

        let nodes = self
            .discovery
            .discover(&cluster.spec.bootstrap_token, self.config.timeout, cancel)
            .await?;
        let observed = u32::try_from(nodes.len()).unwrap_or(u32::MAX);

        self.kube
            .patch_cluster_status(&namespace, &name, &ClusterStatusPatch::observed_nodes(observed))
            .await?;
        if nodes.is_empty() {
            debug!("no paired nodes yet");
            return Ok(());
        }

        info!(observed, declared = cluster.spec.nodes, "nodes discovered");
        let object_ref = cluster.object_ref(&());
        self.events
            .publish(
                &object_ref,
                EventType::Normal,
                reasons::NODES_DISCOVERED,
                actions::DISCOVER,
                Some(format!("{} of {} nodes paired", observed, cluster.spec.nodes)),
            )
            .await;

        let materializer = MachineMaterializer::new(self.kube.as_ref());
        for node in &nodes {
            match materializer.materialize(cluster, node).await {
                Ok(report) if report.created_any() => {
                    self.events
                        .publish(
                            &object_ref,
                            EventType::Normal,
                            reasons::MACHINE_MATERIALIZED,
                            actions::MATERIALIZE,
                            Some(format!("Created machine for node {}", node)),
                        )
                        .await;
                }
                Ok(_) => {}
                Err(e) => warn!(node = %node, error = %e, "materialization failed, retrying next cycle"),
            }
        }
        Ok(())
    }
}
