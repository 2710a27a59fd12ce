//! State handlers for the SwarmCluster controller.
//!
//! Each bootstrap state is handled by a dedicated module. Handlers return a
//! [`StepOutcome`] instead of abusing errors to force a re-run.

mod deploying;
mod provisioning;
mod unset;

pub use deploying::handle_deploying;
pub use provisioning::handle_provisioning;
pub use unset::handle_unset;

use std::time::Duration;

use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{info, warn};

use swarm_common::crd::{set_condition, ClusterState, Condition, ConditionStatus, SwarmCluster};
use swarm_common::events::{actions, reasons};
use swarm_common::Error;

use crate::controller::{ClusterStatusPatch, Context};

/// Delay before re-observing a cluster whose token was just written
pub const TOKEN_REQUEUE: Duration = Duration::from_secs(1);

/// Condition tracking whether all declared nodes paired
pub const BOOTSTRAPPED_CONDITION: &str = "Bootstrapped";

/// Result of one state-machine step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing more to do until the object changes
    Done,
    /// Re-observe the object after the given delay
    RetryAfter(Duration),
    /// The object cannot make progress without outside intervention
    Fatal(String),
}

/// Namespace of a cluster, which must be set for namespaced resources
pub(crate) fn namespace_of(cluster: &SwarmCluster) -> Result<String, Error> {
    cluster
        .namespace()
        .ok_or_else(|| Error::validation_for(cluster.name_any(), "SwarmCluster must be namespaced"))
}

/// Move `cluster` to `next`, guarded by its resource version.
///
/// Returns `Ok(false)` without writing when the move would go backwards.
pub(crate) async fn set_state(
    cluster: &SwarmCluster,
    ctx: &Context,
    next: ClusterState,
) -> Result<bool, Error> {
    let current = cluster.state();
    if !ClusterState::allows(current, next) {
        warn!(
            from = ?current,
            to = %next,
            "refusing backwards state transition"
        );
        return Ok(false);
    }

    let namespace = namespace_of(cluster)?;
    let mut conditions = cluster
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    let (status, reason, message) = match next {
        ClusterState::Deploying => (
            ConditionStatus::False,
            "WaitingForNodes",
            "Pairing tokens issued, waiting for nodes",
        ),
        ClusterState::Provisioning => (
            ConditionStatus::True,
            "NodesPaired",
            "Declared node count reached",
        ),
    };
    set_condition(
        &mut conditions,
        Condition::new(BOOTSTRAPPED_CONDITION, status, reason, message),
    );

    let patch = ClusterStatusPatch {
        resource_version: cluster.resource_version(),
        state: Some(next),
        nodes: None,
        conditions: Some(conditions),
    };
    ctx.kube
        .patch_cluster_status(&namespace, &cluster.name_any(), &patch)
        .await?;

    info!(from = ?current, to = %next, "cluster state updated");
    let event_reason = match next {
        ClusterState::Deploying => reasons::DEPLOYING,
        ClusterState::Provisioning => reasons::PROVISIONING,
    };
    ctx.events
        .publish(
            &cluster.object_ref(&()),
            EventType::Normal,
            event_reason,
            actions::RECONCILE,
            Some(message.to_string()),
        )
        .await;
    Ok(true)
}
