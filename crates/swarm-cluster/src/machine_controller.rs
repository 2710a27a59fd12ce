//! SwarmMachine controller
//!
//! Once Cluster API has adopted a SwarmMachine (its Machine is the owner),
//! the controller ensures the per-machine control secret holding the token
//! the node joins the control network with.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use swarm_common::crd::{control_secret_name, SwarmMachine, CAPI_GROUP, CAPI_MACHINE_KIND};
use swarm_common::events::{actions, reasons};
use swarm_common::kube_utils::owner_of_kind;
use swarm_common::{Error, CLUSTER_NAME_LABEL, CONTROL_SECRET_KEY};

use crate::controller::{requeue_for, Context, DONE_REQUEUE, OWNER_POLL};
use crate::secrets::SecretProvisioner;

/// Reconcile a SwarmMachine resource
#[instrument(skip(machine, ctx), fields(machine = %machine.name_any()))]
pub async fn reconcile_machine(
    machine: Arc<SwarmMachine>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = machine.name_any();
    let Some(namespace) = machine.namespace() else {
        error!("SwarmMachine must be namespaced");
        return Ok(Action::await_change());
    };

    let Some(owner) = owner_of_kind(&machine.metadata, CAPI_GROUP, CAPI_MACHINE_KIND) else {
        debug!("waiting for owner Machine reference");
        return Ok(Action::await_change());
    };
    if ctx
        .kube
        .get_capi_machine(&namespace, &owner.name)
        .await?
        .is_none()
    {
        info!(owner = %owner.name, "owner Machine not found yet");
        return Ok(Action::requeue(OWNER_POLL));
    }

    if machine.spec.control_token.is_empty() {
        warn!("SwarmMachine has no control token, not creating control secret");
        return Ok(Action::await_change());
    }

    let labels: BTreeMap<String, String> = machine
        .labels()
        .get(CLUSTER_NAME_LABEL)
        .map(|cluster| swarm_common::cluster_labels(cluster))
        .unwrap_or_default();
    let secret_name = control_secret_name(&name);
    let created = SecretProvisioner::new(ctx.kube.as_ref())
        .ensure(
            &namespace,
            &secret_name,
            labels,
            BTreeMap::from([(
                CONTROL_SECRET_KEY.to_string(),
                machine.spec.control_token.clone(),
            )]),
        )
        .await?;

    if created {
        info!(secret = %secret_name, "control secret created");
        ctx.events
            .publish(
                &machine.object_ref(&()),
                EventType::Normal,
                reasons::CONTROL_SECRET_CREATED,
                actions::RECONCILE,
                Some(format!("Created control secret {}", secret_name)),
            )
            .await;
    }
    Ok(Action::requeue(DONE_REQUEUE))
}

/// Error policy for the SwarmMachine controller
pub fn machine_error_policy(
    machine: Arc<SwarmMachine>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    error!(?error, machine = %machine.name_any(), "machine reconciliation failed");
    requeue_for(error)
}
