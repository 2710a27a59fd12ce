//! Kubernetes Event recording for swarm controllers.
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so that state transitions and materialized nodes show up in
//! `kubectl describe swarmcluster`.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (e.g. "NodesDiscovered")
    /// * `action` - What action was taken (e.g. "Discover")
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Bootstrap and network tokens were issued
    pub const TOKENS_ISSUED: &str = "TokensIssued";
    /// Cloud-config bootstrap secret was created
    pub const BOOTSTRAP_SECRET_CREATED: &str = "BootstrapSecretCreated";
    /// Cluster moved to Deploying
    pub const DEPLOYING: &str = "Deploying";
    /// Discovered node count matches the requested count
    pub const PROVISIONING: &str = "Provisioning";
    /// Nodes were read from the pairing ledger
    pub const NODES_DISCOVERED: &str = "NodesDiscovered";
    /// A SwarmMachine and CAPI Machine were created for a node
    pub const MACHINE_MATERIALIZED: &str = "MachineMaterialized";
    /// Per-machine control secret was created
    pub const CONTROL_SECRET_CREATED: &str = "ControlSecretCreated";
    /// Spec validation failed
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    /// Publishing the registration payload failed
    pub const REGISTRATION_FAILED: &str = "RegistrationFailed";
}

/// Well-known event action strings.
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Reading the pairing ledger
    pub const DISCOVER: &str = "Discover";
    /// Creating machine objects
    pub const MATERIALIZE: &str = "Materialize";
    /// Announcing the registration payload
    pub const REGISTER: &str = "Register";
}
