//! Cluster API kind resolution
//!
//! The Cluster API `Cluster` and `Machine` kinds are not owned by this
//! operator. Their served version is resolved once through API discovery;
//! when discovery fails or the group is not installed yet, the static
//! `v1beta1` definitions are used.

use kube::api::ApiResource;
use kube::discovery::Discovery;
use kube::Client;
use tracing::{info, warn};

use swarm_common::crd::{
    CapiKinds, CAPI_CLUSTER_KIND, CAPI_FALLBACK_VERSION, CAPI_GROUP, CAPI_MACHINE_KIND,
};
use swarm_common::kube_utils::find_discovered_resource;

/// Resolve the Cluster API kinds served by the cluster
pub async fn resolve_capi_kinds(client: &Client) -> CapiKinds {
    let discovery = match Discovery::new(client.clone())
        .filter(&[CAPI_GROUP])
        .run()
        .await
    {
        Ok(discovery) => discovery,
        Err(e) => {
            warn!(error = %e, "Cluster API discovery failed, using {}", CAPI_FALLBACK_VERSION);
            return CapiKinds::fallback();
        }
    };

    let kinds = kinds_or_fallback(
        discovered(&discovery, CAPI_CLUSTER_KIND),
        discovered(&discovery, CAPI_MACHINE_KIND),
    );
    info!(
        cluster = %kinds.cluster.api_version,
        machine = %kinds.machine.api_version,
        "resolved Cluster API kinds"
    );
    kinds
}

/// Prefer the fallback version when it is served, otherwise the most stable one
fn discovered(discovery: &Discovery, kind: &str) -> Option<ApiResource> {
    let preferred = discovery
        .groups()
        .find(|group| group.name() == CAPI_GROUP)
        .and_then(|group| {
            group
                .versioned_resources(CAPI_FALLBACK_VERSION)
                .into_iter()
                .map(|(ar, _caps)| ar)
                .find(|ar| ar.kind == kind)
        });
    preferred.or_else(|| find_discovered_resource(discovery, CAPI_GROUP, kind))
}

/// Fill in whichever kinds discovery could not resolve
fn kinds_or_fallback(cluster: Option<ApiResource>, machine: Option<ApiResource>) -> CapiKinds {
    let fallback = CapiKinds::fallback();
    if cluster.is_none() || machine.is_none() {
        warn!(
            "Cluster API kinds not fully served, falling back to {}/{}",
            CAPI_GROUP, CAPI_FALLBACK_VERSION
        );
    }
    CapiKinds {
        cluster: cluster.unwrap_or(fallback.cluster),
        machine: machine.unwrap_or(fallback.machine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_common::kube_utils::build_api_resource;

    #[test]
    fn test_missing_kinds_use_fallback() {
        assert_eq!(kinds_or_fallback(None, None), CapiKinds::fallback());
    }

    #[test]
    fn test_discovered_kinds_are_kept() {
        let machine = build_api_resource("cluster.x-k8s.io/v1beta2", "Machine");
        let kinds = kinds_or_fallback(None, Some(machine.clone()));
        assert_eq!(kinds.machine, machine);
        assert_eq!(kinds.cluster, CapiKinds::fallback().cluster);
    }
}
