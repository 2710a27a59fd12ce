//! Cluster enumeration shared by the background loops

use std::time::Duration;

use tracing::warn;

use swarm_common::crd::SwarmCluster;
use swarm_common::Error;

use crate::controller::KubeClient;

/// Settings shared by the discovery and registration loops
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Namespaces to sweep; empty means every namespace
    pub namespaces: Vec<String>,
    /// Bound on one ledger session (discovery or registration)
    pub timeout: Duration,
    /// Stop the loop with a fatal error when namespaces cannot be listed
    pub fail_fast_on_list_error: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            timeout: Duration::from_secs(180),
            fail_fast_on_list_error: false,
        }
    }
}

/// Every SwarmCluster the loops should consider this cycle, in listing order.
///
/// Failing to enumerate namespaces fails the sweep (fatally if configured).
/// A namespace whose clusters cannot be listed is skipped for this cycle.
pub async fn target_clusters(
    kube: &dyn KubeClient,
    config: &LoopConfig,
) -> Result<Vec<SwarmCluster>, Error> {
    let namespaces = if config.namespaces.is_empty() {
        match kube.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) if config.fail_fast_on_list_error => {
                return Err(Error::fatal("list namespaces", e.to_string()));
            }
            Err(e) => return Err(e),
        }
    } else {
        config.namespaces.clone()
    };

    let mut clusters = Vec::new();
    for namespace in &namespaces {
        match kube.list_clusters(namespace).await {
            Ok(found) => clusters.extend(found),
            Err(e) => warn!(namespace = %namespace, error = %e, "failed to list clusters, skipping namespace"),
        }
    }
    Ok(clusters)
}

/// True if a loop should act on `cluster` this cycle
pub fn wants_nodes(cluster: &SwarmCluster) -> bool {
    cluster.needs_nodes() && !cluster.spec.bootstrap_token.is_empty()
}
