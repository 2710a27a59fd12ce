//! Shared status types for swarm CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bootstrap lifecycle state of a SwarmCluster
///
/// An absent state means the cluster has not been initialized yet. States
/// only move forward: `unset -> Deploying -> Provisioning`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterState {
    /// Tokens and bootstrap secret exist; nodes are being paired
    Deploying,
    /// Declared node count was reached; machines are being provisioned
    Provisioning,
}

impl ClusterState {
    fn rank(self) -> u8 {
        match self {
            Self::Deploying => 1,
            Self::Provisioning => 2,
        }
    }

    /// True if moving from `self` to `next` keeps the state monotonic
    ///
    /// Re-entering the current state is allowed so status writes stay idempotent.
    pub fn can_transition_to(self, next: ClusterState) -> bool {
        next.rank() >= self.rank()
    }

    /// Transition check that treats `None` as the unset state
    pub fn allows(current: Option<ClusterState>, next: ClusterState) -> bool {
        match current {
            None => true,
            Some(state) => state.can_transition_to(next),
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deploying => write!(f, "Deploying"),
            Self::Provisioning => write!(f, "Provisioning"),
        }
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

/// Kubernetes-style condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, TokensIssued)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Replace the condition of the same type, keeping the old timestamp if the
/// status did not change
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            let keep_time = existing.status == condition.status;
            let time = existing.last_transition_time;
            *existing = condition;
            if keep_time {
                existing.last_transition_time = time;
            }
        }
        None => conditions.push(condition),
    }
}
