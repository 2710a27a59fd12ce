//! Unset state handler: cluster initialization.
//!
//! Issues the bootstrap and network tokens one at a time, each persisted with
//! a resource-version precondition and followed by a re-observe. Once both
//! exist, ensures the cloud-config bootstrap secret and moves to Deploying.

use std::collections::BTreeMap;

use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use swarm_common::crd::{ClusterState, SwarmCluster};
use swarm_common::events::{actions, reasons};
use swarm_common::{cluster_labels, Error, BOOTSTRAP_SECRET_KEY};

use super::{namespace_of, set_state, StepOutcome, TOKEN_REQUEUE};
use crate::controller::{ClusterSpecPatch, Context};
use crate::secrets::SecretProvisioner;

/// Which token is being issued
#[derive(Clone, Copy, Debug)]
enum TokenField {
    Bootstrap,
    Network,
}

/// Initialize an unset cluster
pub async fn handle_unset(cluster: &SwarmCluster, ctx: &Context) -> Result<StepOutcome, Error> {
    if cluster.spec.bootstrap_token.is_empty() {
        return issue_token(cluster, ctx, TokenField::Bootstrap).await;
    }
    if cluster.spec.network_token.is_empty() {
        return issue_token(cluster, ctx, TokenField::Network).await;
    }

    let namespace = namespace_of(cluster)?;
    let name = cluster.name_any();
    let secret_name = cluster.bootstrap_secret_name();
    let created = SecretProvisioner::new(ctx.kube.as_ref())
        .ensure(
            &namespace,
            &secret_name,
            cluster_labels(&name),
            BTreeMap::from([(
                BOOTSTRAP_SECRET_KEY.to_string(),
                cluster.spec.cloud_config.clone(),
            )]),
        )
        .await?;
    if created {
        info!(secret = %secret_name, "bootstrap secret created");
        ctx.events
            .publish(
                &cluster.object_ref(&()),
                EventType::Normal,
                reasons::BOOTSTRAP_SECRET_CREATED,
                actions::RECONCILE,
                Some(format!("Created cloud-config secret {}", secret_name)),
            )
            .await;
    } else {
        debug!(secret = %secret_name, "bootstrap secret already present");
    }

    set_state(cluster, ctx, ClusterState::Deploying).await?;
    ctx.wake_loops();
    Ok(StepOutcome::Done)
}

async fn issue_token(
    cluster: &SwarmCluster,
    ctx: &Context,
    field: TokenField,
) -> Result<StepOutcome, Error> {
    let namespace = namespace_of(cluster)?;
    let token = ctx.tokens.issue();
    let fingerprint = token.fingerprint();
    let token = token.into_string();

    let mut patch = ClusterSpecPatch {
        resource_version: cluster.resource_version(),
        ..Default::default()
    };
    match field {
        TokenField::Bootstrap => patch.bootstrap_token = Some(token),
        TokenField::Network => patch.network_token = Some(token),
    }
    ctx.kube
        .patch_cluster_spec(&namespace, &cluster.name_any(), &patch)
        .await?;

    info!(token = ?field, fingerprint = %fingerprint, "pairing token issued");
    ctx.events
        .publish(
            &cluster.object_ref(&()),
            EventType::Normal,
            reasons::TOKENS_ISSUED,
            actions::RECONCILE,
            Some(format!("Issued {:?} token", field).to_lowercase()),
        )
        .await;
    Ok(StepOutcome::RetryAfter(TOKEN_REQUEUE))
}
