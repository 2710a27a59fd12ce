//! Typed views of the Cluster API resources swarm reads and writes
//!
//! Cluster API objects are not owned by this operator, so they are accessed
//! through `DynamicObject` with an `ApiResource` resolved once at startup
//! (see [`CapiKinds`]). These structs give the payload a typed shape so no
//! code pokes at untyped JSON maps.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DynamicObject};
use serde::{Deserialize, Serialize};

use crate::kube_utils::build_api_resource;
use crate::{Error, Result};

/// Cluster API core group
pub const CAPI_GROUP: &str = "cluster.x-k8s.io";
/// Version used when API discovery cannot resolve one
pub const CAPI_FALLBACK_VERSION: &str = "v1beta1";
/// Kind of the Cluster API cluster object
pub const CAPI_CLUSTER_KIND: &str = "Cluster";
/// Kind of the Cluster API machine object
pub const CAPI_MACHINE_KIND: &str = "Machine";

/// Resolved `ApiResource`s for the Cluster API kinds swarm touches
#[derive(Clone, Debug, PartialEq)]
pub struct CapiKinds {
    /// `cluster.x-k8s.io` Cluster
    pub cluster: ApiResource,
    /// `cluster.x-k8s.io` Machine
    pub machine: ApiResource,
}

impl CapiKinds {
    /// Static definitions at the fallback version
    pub fn fallback() -> Self {
        let api_version = format!("{}/{}", CAPI_GROUP, CAPI_FALLBACK_VERSION);
        Self {
            cluster: build_api_resource(&api_version, CAPI_CLUSTER_KIND),
            machine: build_api_resource(&api_version, CAPI_MACHINE_KIND),
        }
    }
}

impl Default for CapiKinds {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Bootstrap section of a Machine spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapiBootstrap {
    /// Secret holding the bootstrap data for the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

/// Spec of a Cluster API Machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapiMachineSpec {
    /// Name of the owning Cluster API cluster
    #[serde(default)]
    pub cluster_name: String,

    /// Provider identifier of the backing node
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Bootstrap data reference
    #[serde(default)]
    pub bootstrap: CapiBootstrap,

    /// Reference to the infrastructure machine
    #[serde(default)]
    pub infrastructure_ref: ObjectReference,
}

/// A Cluster API Machine with a typed spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CapiMachine {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Machine spec
    pub spec: CapiMachineSpec,
}

impl CapiMachine {
    /// Build a namespaced Machine with the given labels and spec
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: BTreeMap<String, String>,
        spec: CapiMachineSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                labels: Some(labels),
                ..Default::default()
            },
            spec,
        }
    }

    /// Convert into a `DynamicObject` for the resolved Machine kind
    pub fn to_dynamic(&self, ar: &ApiResource) -> Result<DynamicObject> {
        let mut obj = DynamicObject::new(self.metadata.name.as_deref().unwrap_or_default(), ar);
        obj.metadata = self.metadata.clone();
        obj.data = serde_json::json!({
            "spec": serde_json::to_value(&self.spec)
                .map_err(|e| Error::serialization_for_kind(CAPI_MACHINE_KIND, e.to_string()))?,
        });
        Ok(obj)
    }

    /// Parse a `DynamicObject` returned by the API server.
    ///
    /// A missing spec, or missing spec fields, read as their defaults; only a
    /// spec of the wrong shape is an error.
    pub fn from_dynamic(obj: DynamicObject) -> Result<Self> {
        let spec = match obj.data.get("spec") {
            None | Some(serde_json::Value::Null) => CapiMachineSpec::default(),
            Some(spec) => serde_json::from_value(spec.clone())
                .map_err(|e| Error::serialization_for_kind(CAPI_MACHINE_KIND, e.to_string()))?,
        };
        Ok(Self {
            metadata: obj.metadata,
            spec,
        })
    }
}
