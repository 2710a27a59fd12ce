//! Node registration loop
//!
//! Publishes the registration payload (cloud-config, install device and
//! options) into the pairing ledger of every cluster still waiting for nodes,
//! so that freshly booted nodes can pick it up and join.

use std::sync::Arc;

use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use swarm_common::crd::SwarmCluster;
use swarm_common::events::{actions, reasons, EventPublisher};
use swarm_common::Error;
use swarm_ledger::{NodeRegistrar, Registration};

use crate::controller::KubeClient;
use crate::sweep::{target_clusters, wants_nodes, LoopConfig};

/// Name of the registration loop in logs
pub const REGISTER_NODES: &str = "register-nodes";

/// Announces registration payloads for clusters missing nodes
pub struct NodeRegistrationLoop {
    kube: Arc<dyn KubeClient>,
    registrar: Arc<dyn NodeRegistrar>,
    events: Arc<dyn EventPublisher>,
    config: LoopConfig,
}

impl NodeRegistrationLoop {
    /// Create a registration loop
    pub fn new(
        kube: Arc<dyn KubeClient>,
        registrar: Arc<dyn NodeRegistrar>,
        events: Arc<dyn EventPublisher>,
        config: LoopConfig,
    ) -> Self {
        Self {
            kube,
            registrar,
            events,
            config,
        }
    }

    /// One pass over every cluster still waiting for nodes
    pub async fn resync(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let clusters = target_clusters(self.kube.as_ref(), &self.config).await?;
        for cluster in clusters.iter().filter(|c| wants_nodes(c)) {
            if cancel.is_cancelled() {
                return Err(Error::cancelled(REGISTER_NODES));
            }
            let name = cluster.name_any();
            debug!(cluster = %name, "announcing registration payload");
            match self
                .registrar
                .send(&registration_for(cluster), self.config.timeout, cancel)
                .await
            {
                Ok(()) => {}
                Err(e @ Error::Cancelled { .. }) => return Err(e),
                Err(e) => {
                    warn!(cluster = %name, error = %e, "node registration failed, retrying next cycle");
                    self.events
                        .publish(
                            &cluster.object_ref(&()),
                            EventType::Warning,
                            reasons::REGISTRATION_FAILED,
                            actions::REGISTER,
                            Some(e.to_string()),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }
}

/// Payload announced for `cluster`
pub fn registration_for(cluster: &SwarmCluster) -> Registration {
    Registration {
        token: cluster.spec.bootstrap_token.clone(),
        device: cluster.spec.device.clone(),
        cloud_config: cluster.spec.cloud_config.clone(),
        options: cluster.spec.options.clone(),
    }
}
