//! SwarmCluster Custom Resource Definition
//!
//! A SwarmCluster is the infrastructure half of a Cluster API cluster whose
//! nodes pair themselves over a peer-to-peer ledger. The controller issues the
//! pairing tokens, stores the cloud-config bootstrap secret and records how
//! many nodes have been discovered so far.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterState, Condition};

/// Specification for a SwarmCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "SwarmCluster",
    plural = "swarmclusters",
    shortname = "swc",
    status = "SwarmClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Nodes","type":"integer","jsonPath":".spec.nodes"}"#,
    printcolumn = r#"{"name":"Discovered","type":"integer","jsonPath":".status.nodes"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwarmClusterSpec {
    /// Number of nodes the cluster should converge to
    #[serde(default)]
    pub nodes: u32,

    /// Pairing token nodes use to find the ledger. Generated once, never rotated.
    #[serde(default)]
    pub bootstrap_token: String,

    /// Token for the cluster's overlay network. Generated once, never rotated.
    #[serde(default)]
    pub network_token: String,

    /// Cloud-config handed to nodes through the bootstrap secret
    #[serde(default)]
    pub cloud_config: String,

    /// Install device selector announced to registering nodes (e.g. "auto", "/dev/sda")
    #[serde(default)]
    pub device: String,

    /// Free-form options forwarded to registering nodes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Status for a SwarmCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwarmClusterStatus {
    /// Bootstrap lifecycle state; absent until initialization completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ClusterState>,

    /// Number of nodes seen in the pairing ledger on the last discovery cycle
    #[serde(default)]
    pub nodes: u32,

    /// Conditions representing the cluster state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl SwarmCluster {
    /// Current state, `None` while unset
    pub fn state(&self) -> Option<ClusterState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    /// Node count recorded by the discovery loop
    pub fn observed_nodes(&self) -> u32 {
        self.status.as_ref().map(|s| s.nodes).unwrap_or(0)
    }

    /// True while fewer (or more) nodes were observed than declared
    pub fn needs_nodes(&self) -> bool {
        self.observed_nodes() != self.spec.nodes
    }

    /// True once both pairing tokens have been issued
    pub fn has_tokens(&self) -> bool {
        !self.spec.bootstrap_token.is_empty() && !self.spec.network_token.is_empty()
    }

    /// Name of the bootstrap secret holding the cloud-config (same as the cluster)
    pub fn bootstrap_secret_name(&self) -> String {
        self.name_any()
    }
}
