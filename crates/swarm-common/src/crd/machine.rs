//! SwarmMachine Custom Resource Definition
//!
//! One SwarmMachine exists per node that completed pairing. It is named after
//! the lower-cased node UUID and labelled with the owning cluster's name.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a SwarmMachine
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1alpha1",
    kind = "SwarmMachine",
    plural = "swarmmachines",
    shortname = "swm",
    namespaced,
    printcolumn = r#"{"name":"UUID","type":"string","jsonPath":".spec.uuid"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwarmMachineSpec {
    /// Node identifier as reported in the pairing ledger
    #[serde(rename = "uuid", default)]
    pub uuid: String,

    /// Token the node uses on the control network
    #[serde(default)]
    pub control_token: String,
}

/// Resource name for a node identifier
pub fn machine_name(uuid: &str) -> String {
    uuid.to_lowercase()
}

/// Name of the per-machine control secret
pub fn control_secret_name(machine: &str) -> String {
    format!("{}{}", crate::CONTROL_SECRET_PREFIX, machine)
}
