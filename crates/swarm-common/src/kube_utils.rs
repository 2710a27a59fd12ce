//! Kubernetes utility functions shared by the swarm controllers

use std::path::Path;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::ApiResource;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{info, warn};

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Split an apiVersion into (group, version). Core types have an empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Pluralize a Kubernetes kind using the simple English rules CRDs follow
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Build an ApiResource from a known apiVersion and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Look up a resource in pre-computed API discovery results.
///
/// Returns `None` if the kind is not served (not an error). Picks the most
/// stable version the server offers for the kind.
pub fn find_discovered_resource(
    discovery: &kube::discovery::Discovery,
    group: &str,
    kind: &str,
) -> Option<ApiResource> {
    for api_group in discovery.groups() {
        if api_group.name() != group {
            continue;
        }
        for (ar, _caps) in api_group.resources_by_stability() {
            if ar.kind == kind {
                info!(
                    group = %group,
                    kind = %kind,
                    api_version = %ar.api_version,
                    "discovered API version"
                );
                return Some(ar);
            }
        }
    }
    warn!(group = %group, kind = %kind, "kind not found in API discovery");
    None
}

/// Find the owner reference of the given kind whose apiVersion is in `group`
pub fn owner_of_kind<'a>(
    meta: &'a ObjectMeta,
    group: &str,
    kind: &str,
) -> Option<&'a OwnerReference> {
    meta.owner_references.as_ref()?.iter().find(|owner| {
        owner.kind == kind && parse_api_version(&owner.api_version).0 == group
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: format!("{}-uid", name),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_api_version() {
        assert_eq!(
            parse_api_version("cluster.x-k8s.io/v1beta1"),
            ("cluster.x-k8s.io".to_string(), "v1beta1".to_string())
        );
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
    }

    #[test]
    fn test_pluralize_kind() {
        assert_eq!(pluralize_kind("Machine"), "machines");
        assert_eq!(pluralize_kind("SwarmCluster"), "swarmclusters");
        assert_eq!(pluralize_kind("Policy"), "policies");
        assert_eq!(pluralize_kind("Gateway"), "gateways");
        assert_eq!(pluralize_kind("Address"), "addresses");
    }

    #[test]
    fn test_build_api_resource() {
        let ar = build_api_resource("cluster.x-k8s.io/v1beta1", "Machine");
        assert_eq!(ar.group, "cluster.x-k8s.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.plural, "machines");
    }

    #[test]
    fn test_owner_of_kind_matches_group_and_kind() {
        let meta = ObjectMeta {
            owner_references: Some(vec![
                owner("infrastructure.cluster.x-k8s.io/v1alpha1", "Cluster", "wrong-group"),
                owner("cluster.x-k8s.io/v1beta1", "Machine", "wrong-kind"),
                owner("cluster.x-k8s.io/v1beta1", "Cluster", "edge"),
            ]),
            ..Default::default()
        };
        let found = owner_of_kind(&meta, "cluster.x-k8s.io", "Cluster").map(|o| o.name.as_str());
        assert_eq!(found, Some("edge"));
    }

    #[test]
    fn test_owner_of_kind_none_without_owners() {
        assert!(owner_of_kind(&ObjectMeta::default(), "cluster.x-k8s.io", "Cluster").is_none());
    }
}
