//! Machine materialization
//!
//! Turns a node identifier read from the pairing ledger into a SwarmMachine
//! and the Cluster API Machine that points at it. Every step is
//! get-before-create, so a partially materialized node is completed by simply
//! running again on the next discovery cycle.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use swarm_common::crd::{
    machine_name, CapiBootstrap, CapiMachine, CapiMachineSpec, SwarmCluster, SwarmMachine,
    SwarmMachineSpec,
};
use swarm_common::{cluster_labels, Error, PROVIDER_ID};

use crate::controller::KubeClient;

/// What a materialization created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Materialized {
    /// A SwarmMachine was created by this call
    pub machine_created: bool,
    /// A Cluster API Machine was created by this call
    pub capi_machine_created: bool,
}

impl Materialized {
    /// True if this call created anything
    pub fn created_any(&self) -> bool {
        self.machine_created || self.capi_machine_created
    }
}

/// Creates the machine records for discovered nodes
pub struct MachineMaterializer<'a> {
    kube: &'a dyn KubeClient,
}

impl<'a> MachineMaterializer<'a> {
    /// Materialize through `kube`
    pub fn new(kube: &'a dyn KubeClient) -> Self {
        Self { kube }
    }

    /// Ensure both machine records exist for `node` in `cluster`
    pub async fn materialize(&self, cluster: &SwarmCluster, node: &str) -> Result<Materialized, Error> {
        let cluster_name = cluster.name_any();
        let namespace = cluster
            .namespace()
            .ok_or_else(|| Error::validation_for(&cluster_name, "SwarmCluster must be namespaced"))?;
        let name = machine_name(node);
        let labels = cluster_labels(&cluster_name);
        let mut report = Materialized::default();

        if self.kube.get_machine(&namespace, &name).await?.is_none() {
            let mut machine = SwarmMachine::new(
                &name,
                SwarmMachineSpec {
                    uuid: node.to_string(),
                    control_token: cluster.spec.network_token.clone(),
                },
            );
            machine.metadata.namespace = Some(namespace.clone());
            machine.metadata.labels = Some(labels.clone());
            report.machine_created = created(self.kube.create_machine(&machine).await)?;
        }

        // the uid is assigned by the API server, so read the stored object back
        let machine = self
            .kube
            .get_machine(&namespace, &name)
            .await?
            .ok_or_else(|| {
                Error::internal_with_context(
                    "materialize",
                    format!("SwarmMachine {}/{} vanished after create", namespace, name),
                )
            })?;

        if self.kube.get_capi_machine(&namespace, &name).await?.is_some() {
            debug!(machine = %name, "Machine exists");
            return Ok(report);
        }

        let capi = CapiMachine::new(
            &name,
            &namespace,
            labels,
            CapiMachineSpec {
                cluster_name: cluster_name.clone(),
                provider_id: Some(PROVIDER_ID.to_string()),
                bootstrap: CapiBootstrap {
                    data_secret_name: Some(cluster.bootstrap_secret_name()),
                },
                infrastructure_ref: ObjectReference {
                    api_version: Some(SwarmMachine::api_version(&()).to_string()),
                    kind: Some(SwarmMachine::kind(&()).to_string()),
                    namespace: Some(namespace.clone()),
                    name: Some(name.clone()),
                    uid: machine.metadata.uid.clone(),
                    ..Default::default()
                },
            },
        );
        report.capi_machine_created = created(self.kube.create_capi_machine(&capi).await)?;
        if report.created_any() {
            info!(node, machine = %name, cluster = %cluster_name, "machine materialized");
        }
        Ok(report)
    }
}

/// Fold a create result: `AlreadyExists` means another writer got there first
fn created(result: Result<(), Error>) -> Result<bool, Error> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}
