//! Idempotent secret creation
//!
//! Secrets written by swarm are never updated once they exist: a secret that
//! is already present is left untouched, whoever created it.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

use swarm_common::Error;

use crate::controller::KubeClient;

/// Creates Opaque secrets if they do not exist yet
pub struct SecretProvisioner<'a> {
    kube: &'a dyn KubeClient,
}

impl<'a> SecretProvisioner<'a> {
    /// Provision through `kube`
    pub fn new(kube: &'a dyn KubeClient) -> Self {
        Self { kube }
    }

    /// Make sure `namespace/name` exists.
    ///
    /// Returns `true` if this call created it. An existing secret (including
    /// one created concurrently between the lookup and the create) is never
    /// modified and yields `false`.
    pub async fn ensure(
        &self,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        payload: BTreeMap<String, String>,
    ) -> Result<bool, Error> {
        if self.kube.get_secret(namespace, name).await?.is_some() {
            debug!(namespace, name, "secret exists");
            return Ok(false);
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(payload),
            ..Default::default()
        };

        match self.kube.create_secret(&secret).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_already_exists() => {
                debug!(namespace, name, "secret created concurrently");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
