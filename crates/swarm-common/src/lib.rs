//! Common types for swarm: CRDs, errors, and Kubernetes utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager / reporting controller name for everything swarm writes
pub const FIELD_MANAGER: &str = "swarm-controller";

/// Label linking machines and secrets to their owning cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Provider identifier set on every generic Machine swarm creates
pub const PROVIDER_ID: &str = "swarm";

/// Key of the single field in the cluster bootstrap secret (raw cloud-config)
pub const BOOTSTRAP_SECRET_KEY: &str = "value";

/// Prefix of the per-machine control secret name
pub const CONTROL_SECRET_PREFIX: &str = "control-";

/// Key of the single field in the per-machine control secret
pub const CONTROL_SECRET_KEY: &str = "network_token";

/// Build the cluster-name label map for an owning cluster
pub fn cluster_labels(cluster: &str) -> std::collections::BTreeMap<String, String> {
    std::collections::BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), cluster.to_string())])
}
