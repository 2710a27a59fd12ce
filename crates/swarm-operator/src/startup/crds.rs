//! CRD installation
//!
//! The operator installs its own CRDs on startup using server-side apply, so
//! the served schema always matches the operator version.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use swarm_common::crd::{SwarmCluster, SwarmMachine};
use swarm_common::retry::{retry_with_backoff, RetryConfig};
use swarm_common::FIELD_MANAGER;

/// Attempts before CRD installation is given up
const INSTALL_ATTEMPTS: u32 = 5;

/// CRD definition with name and resource
struct CrdDef {
    name: String,
    crd: CustomResourceDefinition,
}

fn crd_def(crd: CustomResourceDefinition) -> CrdDef {
    CrdDef {
        name: crd.metadata.name.clone().unwrap_or_default(),
        crd,
    }
}

/// Every CRD served by the operator
fn swarm_crds() -> Vec<CrdDef> {
    vec![crd_def(SwarmCluster::crd()), crd_def(SwarmMachine::crd())]
}

/// Multi-document YAML of every CRD, as printed by `--crd`
pub fn crd_manifests() -> anyhow::Result<String> {
    let docs = swarm_crds()
        .into_iter()
        .map(|def| {
            serde_yaml::to_string(&def.crd)
                .map_err(|e| anyhow::anyhow!("failed to serialize {} CRD: {}", def.name, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

/// Install or update every CRD, retrying while the API server settles
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for def in swarm_crds() {
        tracing::info!("Installing {} CRD...", def.name);
        let patch = Patch::Apply(&def.crd);
        retry_with_backoff(
            &RetryConfig::with_max_attempts(INSTALL_ATTEMPTS),
            "install_crd",
            || crds.patch(&def.name, &params, &patch),
        )
        .await
        .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", def.name, e))?;
    }

    tracing::info!("swarm CRDs installed/updated");
    Ok(())
}
