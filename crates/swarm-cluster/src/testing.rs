//! In-memory object store for tests
//!
//! `FakeKube` behaves like the API server where the tests care: resource
//! versions advance on every write, patches carrying a stale resource
//! version fail with 409 Conflict, and creating an existing object fails
//! with 409 AlreadyExists.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::ErrorResponse;
use kube::ResourceExt;

use swarm_common::crd::{
    CapiMachine, SwarmCluster, SwarmClusterSpec, SwarmClusterStatus, SwarmMachine,
};
use swarm_common::Error;

use crate::controller::{ClusterSpecPatch, ClusterStatusPatch, KubeClient};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: message.into(),
        reason: reason.into(),
        code,
    }))
}

/// 409 Conflict as returned for a stale resource version
pub fn conflict() -> Error {
    api_error(
        409,
        "Conflict",
        "the object has been modified; please apply your changes to the latest version",
    )
}

/// 409 AlreadyExists as returned for a duplicate create
pub fn already_exists() -> Error {
    api_error(409, "AlreadyExists", "object already exists")
}

/// 503 as returned by an unavailable API server
pub fn unavailable() -> Error {
    api_error(503, "ServiceUnavailable", "the server is currently unable to handle the request")
}

fn not_found(name: &str) -> Error {
    api_error(404, "NotFound", &format!("{} not found", name))
}

/// A SwarmCluster owned by the Cluster API Cluster of the same name
pub fn capi_owned_cluster(namespace: &str, name: &str, nodes: u32) -> SwarmCluster {
    let mut cluster = SwarmCluster::new(
        name,
        SwarmClusterSpec {
            nodes,
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some(namespace.to_string());
    cluster.metadata.resource_version = Some("1".to_string());
    cluster.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Cluster".to_string(),
        name: name.to_string(),
        uid: format!("{}-capi-uid", name),
        controller: Some(true),
        ..Default::default()
    }]);
    cluster
}

#[derive(Default)]
struct Store {
    next_version: u64,
    namespaces: BTreeSet<String>,
    capi_clusters: BTreeSet<Key>,
    clusters: BTreeMap<Key, SwarmCluster>,
    secrets: BTreeMap<Key, Secret>,
    machines: BTreeMap<Key, SwarmMachine>,
    capi_machines: BTreeMap<Key, CapiMachine>,
    failing_namespaces: BTreeSet<String>,
    fail_namespace_list: bool,
    spec_patches: usize,
    status_patches: usize,
    secret_creates: usize,
    machine_creates: usize,
    capi_machine_creates: usize,
}

impl Store {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn stamp(&mut self, meta: &mut ObjectMeta) {
        let version = self.bump();
        meta.uid = Some(format!("uid-{}", version));
        meta.resource_version = Some(version);
    }

    fn cluster_for_write(
        &mut self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
    ) -> Result<&mut SwarmCluster, Error> {
        let cluster = self
            .clusters
            .get_mut(&key(namespace, name))
            .ok_or_else(|| not_found(name))?;
        if let Some(expected) = resource_version {
            if cluster.metadata.resource_version.as_deref() != Some(expected) {
                return Err(conflict());
            }
        }
        Ok(cluster)
    }
}

/// In-memory [`KubeClient`]
#[derive(Default)]
pub struct FakeKube {
    store: Mutex<Store>,
}

impl FakeKube {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    pub fn insert_namespace(&self, namespace: &str) {
        self.store().namespaces.insert(namespace.to_string());
    }

    pub fn insert_capi_cluster(&self, namespace: &str, name: &str) {
        let mut store = self.store();
        store.namespaces.insert(namespace.to_string());
        store.capi_clusters.insert(key(namespace, name));
    }

    /// Store a cluster as-is apart from a fresh resource version
    pub fn insert_cluster(&self, mut cluster: SwarmCluster) {
        let mut store = self.store();
        let namespace = cluster.namespace().unwrap_or_default();
        cluster.metadata.resource_version = Some(store.bump());
        store.namespaces.insert(namespace.clone());
        store
            .clusters
            .insert(key(&namespace, &cluster.name_any()), cluster);
    }

    /// Store a bootstrap-style secret without counting it as a create
    pub fn insert_secret(&self, namespace: &str, name: &str, value: &str) {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            string_data: Some(BTreeMap::from([("value".to_string(), value.to_string())])),
            ..Default::default()
        };
        self.store().secrets.insert(key(namespace, name), secret);
    }

    pub fn fail_namespace_list(&self) {
        self.store().fail_namespace_list = true;
    }

    pub fn fail_namespace(&self, namespace: &str) {
        self.store().failing_namespaces.insert(namespace.to_string());
    }

    pub fn cluster(&self, namespace: &str, name: &str) -> Option<SwarmCluster> {
        self.store().clusters.get(&key(namespace, name)).cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.store().secrets.get(&key(namespace, name)).cloned()
    }

    pub fn machine(&self, namespace: &str, name: &str) -> Option<SwarmMachine> {
        self.store().machines.get(&key(namespace, name)).cloned()
    }

    pub fn capi_machine(&self, namespace: &str, name: &str) -> Option<CapiMachine> {
        self.store().capi_machines.get(&key(namespace, name)).cloned()
    }

    pub fn machine_names(&self, namespace: &str) -> Vec<String> {
        self.store()
            .machines
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn spec_patch_count(&self) -> usize {
        self.store().spec_patches
    }

    pub fn status_patch_count(&self) -> usize {
        self.store().status_patches
    }

    pub fn secret_create_count(&self) -> usize {
        self.store().secret_creates
    }

    pub fn machine_create_count(&self) -> usize {
        self.store().machine_creates
    }

    pub fn capi_machine_create_count(&self) -> usize {
        self.store().capi_machine_creates
    }
}

#[async_trait]
impl KubeClient for FakeKube {
    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        let store = self.store();
        if store.fail_namespace_list {
            return Err(unavailable());
        }
        Ok(store.namespaces.iter().cloned().collect())
    }

    async fn list_clusters(&self, namespace: &str) -> Result<Vec<SwarmCluster>, Error> {
        let store = self.store();
        if store.failing_namespaces.contains(namespace) {
            return Err(unavailable());
        }
        Ok(store
            .clusters
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, cluster)| cluster.clone())
            .collect())
    }

    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SwarmCluster>, Error> {
        Ok(self.cluster(namespace, name))
    }

    async fn patch_cluster_spec(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterSpecPatch,
    ) -> Result<(), Error> {
        let mut store = self.store();
        let version = store.bump();
        let cluster =
            store.cluster_for_write(namespace, name, patch.resource_version.as_deref())?;
        if let Some(token) = &patch.bootstrap_token {
            cluster.spec.bootstrap_token = token.clone();
        }
        if let Some(token) = &patch.network_token {
            cluster.spec.network_token = token.clone();
        }
        cluster.metadata.resource_version = Some(version);
        store.spec_patches += 1;
        Ok(())
    }

    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterStatusPatch,
    ) -> Result<(), Error> {
        let mut store = self.store();
        let version = store.bump();
        let cluster =
            store.cluster_for_write(namespace, name, patch.resource_version.as_deref())?;
        let status = cluster.status.get_or_insert_with(SwarmClusterStatus::default);
        if let Some(state) = patch.state {
            status.state = Some(state);
        }
        if let Some(nodes) = patch.nodes {
            status.nodes = nodes;
        }
        if let Some(conditions) = &patch.conditions {
            status.conditions = conditions.clone();
        }
        cluster.metadata.resource_version = Some(version);
        store.status_patches += 1;
        Ok(())
    }

    async fn capi_cluster_exists(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        Ok(self.store().capi_clusters.contains(&key(namespace, name)))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let mut store = self.store();
        let k = key(
            &secret.namespace().unwrap_or_default(),
            &secret.name_any(),
        );
        if store.secrets.contains_key(&k) {
            return Err(already_exists());
        }
        let mut secret = secret.clone();
        store.stamp(&mut secret.metadata);
        store.secrets.insert(k, secret);
        store.secret_creates += 1;
        Ok(())
    }

    async fn get_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SwarmMachine>, Error> {
        Ok(self.machine(namespace, name))
    }

    async fn create_machine(&self, machine: &SwarmMachine) -> Result<(), Error> {
        let mut store = self.store();
        let k = key(
            &machine.namespace().unwrap_or_default(),
            &machine.name_any(),
        );
        if store.machines.contains_key(&k) {
            return Err(already_exists());
        }
        let mut machine = machine.clone();
        store.stamp(&mut machine.metadata);
        store.machines.insert(k, machine);
        store.machine_creates += 1;
        Ok(())
    }

    async fn get_capi_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapiMachine>, Error> {
        Ok(self.capi_machine(namespace, name))
    }

    async fn create_capi_machine(&self, machine: &CapiMachine) -> Result<(), Error> {
        let mut store = self.store();
        let k = key(
            machine.metadata.namespace.as_deref().unwrap_or_default(),
            machine.metadata.name.as_deref().unwrap_or_default(),
        );
        if store.capi_machines.contains_key(&k) {
            return Err(already_exists());
        }
        let mut machine = machine.clone();
        store.stamp(&mut machine.metadata);
        store.capi_machines.insert(k, machine);
        store.capi_machine_creates += 1;
        Ok(())
    }
}
