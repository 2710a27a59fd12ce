//! SwarmCluster controller implementation
//!
//! The controller drives each SwarmCluster through its bootstrap states:
//! issue the pairing tokens, store the cloud-config secret, then wait for the
//! discovery loop to observe the declared number of nodes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use swarm_common::crd::{
    CapiKinds, CapiMachine, ClusterState, Condition, SwarmCluster, SwarmMachine, CAPI_CLUSTER_KIND,
    CAPI_GROUP,
};
use swarm_common::events::{actions, reasons, EventPublisher, KubeEventPublisher};
use swarm_common::kube_utils::owner_of_kind;
use swarm_common::{Error, FIELD_MANAGER};
use swarm_ledger::{RandomTokenIssuer, TokenIssuer};

use crate::phases::{handle_deploying, handle_provisioning, handle_unset, StepOutcome};
use crate::scheduler::ResyncHandle;

/// Requeue delay after an optimistic-concurrency conflict
pub const CONFLICT_REQUEUE: Duration = Duration::from_secs(1);
/// Requeue delay after any other reconcile failure
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);
/// Poll delay while the owning Cluster API object does not exist yet
pub const OWNER_POLL: Duration = Duration::from_secs(10);
/// Periodic requeue once a step is done
pub const DONE_REQUEUE: Duration = Duration::from_secs(300);

/// Merge patch for the token fields of a SwarmCluster spec
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterSpecPatch {
    /// Resource version precondition; `None` writes unconditionally
    pub resource_version: Option<String>,
    /// New bootstrap token
    pub bootstrap_token: Option<String>,
    /// New network token
    pub network_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpecPatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    bootstrap_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_token: Option<&'a str>,
}

impl ClusterSpecPatch {
    /// JSON merge patch body
    pub fn to_merge_patch(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "spec": SpecPatchBody {
                bootstrap_token: self.bootstrap_token.as_deref(),
                network_token: self.network_token.as_deref(),
            }
        });
        with_resource_version(&mut body, self.resource_version.as_deref());
        body
    }
}

/// Merge patch for the status of a SwarmCluster
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterStatusPatch {
    /// Resource version precondition; `None` writes unconditionally
    pub resource_version: Option<String>,
    /// New lifecycle state
    pub state: Option<ClusterState>,
    /// Observed node count
    pub nodes: Option<u32>,
    /// Full replacement condition list
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Serialize)]
struct StatusPatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<ClusterState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<&'a [Condition]>,
}

impl ClusterStatusPatch {
    /// Unconditional write of the observed node count
    pub fn observed_nodes(nodes: u32) -> Self {
        Self {
            nodes: Some(nodes),
            ..Default::default()
        }
    }

    /// JSON merge patch body
    pub fn to_merge_patch(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "status": StatusPatchBody {
                state: self.state,
                nodes: self.nodes,
                conditions: self.conditions.as_deref(),
            }
        });
        with_resource_version(&mut body, self.resource_version.as_deref());
        body
    }
}

fn with_resource_version(body: &mut serde_json::Value, resource_version: Option<&str>) {
    if let (Some(rv), Some(obj)) = (resource_version, body.as_object_mut()) {
        obj.insert(
            "metadata".to_string(),
            serde_json::json!({ "resourceVersion": rv }),
        );
    }
}

/// Trait abstracting the object-store operations swarm performs
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// List the names of all namespaces
    async fn list_namespaces(&self) -> Result<Vec<String>, Error>;

    /// List SwarmClusters in a namespace
    async fn list_clusters(&self, namespace: &str) -> Result<Vec<SwarmCluster>, Error>;

    /// Get a SwarmCluster
    async fn get_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<SwarmCluster>, Error>;

    /// Merge-patch the spec of a SwarmCluster
    async fn patch_cluster_spec(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterSpecPatch,
    ) -> Result<(), Error>;

    /// Merge-patch the status of a SwarmCluster
    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterStatusPatch,
    ) -> Result<(), Error>;

    /// Check whether a Cluster API Cluster exists
    async fn capi_cluster_exists(&self, namespace: &str, name: &str) -> Result<bool, Error>;

    /// Get a Secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret (fails with AlreadyExists if it exists)
    async fn create_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Get a SwarmMachine
    async fn get_machine(&self, namespace: &str, name: &str)
        -> Result<Option<SwarmMachine>, Error>;

    /// Create a SwarmMachine (fails with AlreadyExists if it exists)
    async fn create_machine(&self, machine: &SwarmMachine) -> Result<(), Error>;

    /// Get a Cluster API Machine
    async fn get_capi_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapiMachine>, Error>;

    /// Create a Cluster API Machine (fails with AlreadyExists if it exists)
    async fn create_capi_machine(&self, machine: &CapiMachine) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
    capi: CapiKinds,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl writing Cluster API kinds through `capi`
    pub fn new(client: Client, capi: CapiKinds) -> Self {
        Self { client, capi }
    }

    fn dynamic(&self, namespace: &str, ar: &kube::api::ApiResource) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, ar)
    }
}

fn patch_params() -> PatchParams {
    PatchParams::apply(FIELD_MANAGER)
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_clusters(&self, namespace: &str) -> Result<Vec<SwarmCluster>, Error> {
        let api: Api<SwarmCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SwarmCluster>, Error> {
        let api: Api<SwarmCluster> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_cluster_spec(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterSpecPatch,
    ) -> Result<(), Error> {
        let api: Api<SwarmCluster> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &patch_params(), &Patch::Merge(&patch.to_merge_patch()))
            .await?;
        Ok(())
    }

    async fn patch_cluster_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &ClusterStatusPatch,
    ) -> Result<(), Error> {
        let api: Api<SwarmCluster> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &patch_params(), &Patch::Merge(&patch.to_merge_patch()))
            .await?;
        Ok(())
    }

    async fn capi_cluster_exists(&self, namespace: &str, name: &str) -> Result<bool, Error> {
        match self.dynamic(namespace, &self.capi.cluster).get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let namespace = secret
            .namespace()
            .ok_or_else(|| Error::validation("secret must be namespaced"))?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&post_params(), secret).await?;
        Ok(())
    }

    async fn get_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SwarmMachine>, Error> {
        let api: Api<SwarmMachine> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(machine) => Ok(Some(machine)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_machine(&self, machine: &SwarmMachine) -> Result<(), Error> {
        let namespace = machine
            .namespace()
            .ok_or_else(|| Error::validation("SwarmMachine must be namespaced"))?;
        let api: Api<SwarmMachine> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&post_params(), machine).await?;
        Ok(())
    }

    async fn get_capi_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapiMachine>, Error> {
        match self.dynamic(namespace, &self.capi.machine).get(name).await {
            Ok(obj) => CapiMachine::from_dynamic(obj).map(Some),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_capi_machine(&self, machine: &CapiMachine) -> Result<(), Error> {
        let namespace = machine
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| Error::validation("Machine must be namespaced"))?;
        let obj = machine.to_dynamic(&self.capi.machine)?;
        self.dynamic(&namespace, &self.capi.machine)
            .create(&post_params(), &obj)
            .await?;
        Ok(())
    }
}

/// Controller context containing shared state and clients
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Event publisher for Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Source of pairing tokens
    pub tokens: Arc<dyn TokenIssuer>,
    /// Wake-up handles of the background loops
    pub resync: Vec<ResyncHandle>,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Ask every background loop for an immediate resync
    pub fn wake_loops(&self) {
        for handle in &self.resync {
            handle.wake();
        }
    }

    /// Create a context for testing with a custom client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self {
            kube,
            events: Arc::new(swarm_common::events::NoopEventPublisher),
            tokens: Arc::new(RandomTokenIssuer),
            resync: Vec::new(),
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    events: Option<Arc<dyn EventPublisher>>,
    tokens: Option<Arc<dyn TokenIssuer>>,
    capi: CapiKinds,
    resync: Vec<ResyncHandle>,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            events: None,
            tokens: None,
            capi: CapiKinds::fallback(),
            resync: Vec::new(),
        }
    }

    /// Use Cluster API kinds resolved through discovery
    pub fn capi_kinds(mut self, capi: CapiKinds) -> Self {
        self.capi = capi;
        self
    }

    /// Register a background loop to wake after initialization
    pub fn resync_handle(mut self, handle: ResyncHandle) -> Self {
        self.resync.push(handle);
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the event publisher
    pub fn event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Override the token issuer
    pub fn token_issuer(mut self, tokens: Arc<dyn TokenIssuer>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        let client = self.client;
        let capi = self.capi;
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(client.clone(), capi))),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER))),
            tokens: self.tokens.unwrap_or_else(|| Arc::new(RandomTokenIssuer)),
            resync: self.resync,
        }
    }
}

/// Map a step outcome onto a controller action
pub fn outcome_to_action(outcome: StepOutcome) -> Action {
    match outcome {
        StepOutcome::Done => Action::requeue(DONE_REQUEUE),
        StepOutcome::RetryAfter(delay) => Action::requeue(delay),
        StepOutcome::Fatal(reason) => {
            error!(reason = %reason, "reconcile cannot make progress");
            Action::await_change()
        }
    }
}

/// Reconcile a SwarmCluster resource
///
/// Waits until the cluster is owned by an existing Cluster API Cluster, then
/// re-reads the object and runs the handler for its current state.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<SwarmCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name_any();
    let Some(namespace) = cluster.namespace() else {
        let message = "SwarmCluster must be namespaced";
        ctx.events
            .publish(
                &cluster.object_ref(&()),
                EventType::Warning,
                reasons::VALIDATION_FAILED,
                actions::RECONCILE,
                Some(message.to_string()),
            )
            .await;
        return Ok(outcome_to_action(StepOutcome::Fatal(message.to_string())));
    };

    let Some(owner) = owner_of_kind(&cluster.metadata, CAPI_GROUP, CAPI_CLUSTER_KIND) else {
        info!("waiting for owner Cluster reference");
        return Ok(Action::await_change());
    };
    if !ctx.kube.capi_cluster_exists(&namespace, &owner.name).await? {
        info!(owner = %owner.name, "owner Cluster not found yet");
        return Ok(Action::requeue(OWNER_POLL));
    }

    let Some(current) = ctx.kube.get_cluster(&namespace, &name).await? else {
        debug!("cluster no longer exists");
        return Ok(Action::await_change());
    };

    let outcome = match current.state() {
        None => handle_unset(&current, &ctx).await?,
        Some(ClusterState::Deploying) => handle_deploying(&current, &ctx).await?,
        Some(ClusterState::Provisioning) => handle_provisioning(&current, &ctx).await?,
    };
    Ok(outcome_to_action(outcome))
}

/// Requeue policy shared by the swarm controllers
pub fn requeue_for(error: &Error) -> Action {
    if error.is_conflict() {
        Action::requeue(CONFLICT_REQUEUE)
    } else {
        Action::requeue(ERROR_REQUEUE)
    }
}

/// Error policy for the SwarmCluster controller
pub fn error_policy(cluster: Arc<SwarmCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_conflict() {
        warn!(cluster = %cluster.name_any(), "concurrent update, retrying");
    } else {
        error!(?error, cluster = %cluster.name_any(), "reconciliation failed");
    }
    requeue_for(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{capi_owned_cluster, FakeKube};
    use kube::core::ErrorResponse;

    fn conflict() -> Error {
        Error::from(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "the object has been modified".into(),
            reason: "Conflict".into(),
            code: 409,
        }))
    }

    #[test]
    fn test_spec_patch_carries_resource_version() {
        let patch = ClusterSpecPatch {
            resource_version: Some("42".into()),
            bootstrap_token: Some("tok".into()),
            network_token: None,
        };
        let body = patch.to_merge_patch();
        assert_eq!(body["metadata"]["resourceVersion"], "42");
        assert_eq!(body["spec"]["bootstrapToken"], "tok");
        assert!(body["spec"].get("networkToken").is_none());
    }

    #[test]
    fn test_node_count_patch_is_unconditional() {
        let body = ClusterStatusPatch::observed_nodes(3).to_merge_patch();
        assert!(body.get("metadata").is_none());
        assert_eq!(body["status"]["nodes"], 3);
        assert!(body["status"].get("state").is_none());
    }

    #[test]
    fn test_state_patch_serializes_state_name() {
        let patch = ClusterStatusPatch {
            resource_version: Some("7".into()),
            state: Some(ClusterState::Provisioning),
            ..Default::default()
        };
        assert_eq!(patch.to_merge_patch()["status"]["state"], "Provisioning");
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            outcome_to_action(StepOutcome::RetryAfter(Duration::from_secs(1))),
            Action::requeue(Duration::from_secs(1))
        );
        assert_eq!(outcome_to_action(StepOutcome::Done), Action::requeue(DONE_REQUEUE));
        assert_eq!(
            outcome_to_action(StepOutcome::Fatal("bad".into())),
            Action::await_change()
        );
    }

    #[test]
    fn story_conflicts_requeue_faster_than_failures() {
        assert_eq!(requeue_for(&conflict()), Action::requeue(CONFLICT_REQUEUE));
        assert_eq!(
            requeue_for(&Error::internal("boom")),
            Action::requeue(ERROR_REQUEUE)
        );
    }

    #[tokio::test]
    async fn story_cluster_without_owner_waits_and_writes_nothing() {
        let mut mock = MockKubeClient::new();
        mock.expect_capi_cluster_exists().never();
        mock.expect_patch_cluster_spec().never();
        mock.expect_patch_cluster_status().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock)));

        let mut cluster = SwarmCluster::new("edge", Default::default());
        cluster.metadata.namespace = Some("fleet".into());

        let action = reconcile(Arc::new(cluster), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn story_cluster_without_namespace_is_not_retried() {
        let mut mock = MockKubeClient::new();
        mock.expect_capi_cluster_exists().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock)));

        let action = reconcile(Arc::new(SwarmCluster::new("edge", Default::default())), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn story_owner_not_created_yet_polls_again() {
        let mut mock = MockKubeClient::new();
        mock.expect_capi_cluster_exists()
            .returning(|_, _| Ok(false));
        mock.expect_get_cluster().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock)));

        let action = reconcile(Arc::new(capi_owned_cluster("fleet", "edge", 2)), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(OWNER_POLL));
    }

    #[tokio::test]
    async fn story_deleted_cluster_is_a_noop() {
        let mut mock = MockKubeClient::new();
        mock.expect_capi_cluster_exists().returning(|_, _| Ok(true));
        mock.expect_get_cluster().returning(|_, _| Ok(None));
        mock.expect_patch_cluster_spec().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock)));

        let action = reconcile(Arc::new(capi_owned_cluster("fleet", "edge", 2)), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn story_conflicting_patch_surfaces_as_retryable_error() {
        let mut mock = MockKubeClient::new();
        mock.expect_capi_cluster_exists().returning(|_, _| Ok(true));
        mock.expect_get_cluster()
            .returning(|ns, name| Ok(Some(capi_owned_cluster(ns, name, 2))));
        mock.expect_patch_cluster_spec()
            .returning(|_, _, _| Err(conflict()));
        let ctx = Arc::new(Context::for_testing(Arc::new(mock)));

        let cluster = Arc::new(capi_owned_cluster("fleet", "edge", 2));
        let err = reconcile(cluster.clone(), ctx.clone()).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.is_retryable());
        assert_eq!(
            error_policy(cluster, &err, ctx),
            Action::requeue(CONFLICT_REQUEUE)
        );
    }

    /// Story: a SwarmCluster is created under a CAPI Cluster with two nodes.
    /// Successive reconciles issue both tokens, create the bootstrap secret,
    /// enter Deploying, and once discovery records two nodes, Provisioning.
    #[tokio::test]
    async fn story_full_bootstrap_walkthrough() {
        let kube = Arc::new(FakeKube::new());
        kube.insert_capi_cluster("fleet", "edge");
        kube.insert_cluster(capi_owned_cluster("fleet", "edge", 2));
        let ctx = Arc::new(Context::for_testing(kube.clone()));
        let trigger = Arc::new(capi_owned_cluster("fleet", "edge", 2));

        // bootstrap token, then network token: each asks to be re-run
        for _ in 0..2 {
            let action = reconcile(trigger.clone(), ctx.clone()).await.unwrap();
            assert_eq!(action, Action::requeue(crate::phases::TOKEN_REQUEUE));
        }
        let action = reconcile(trigger.clone(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::requeue(DONE_REQUEUE));

        let cluster = kube.cluster("fleet", "edge").unwrap();
        assert!(cluster.has_tokens());
        assert_eq!(cluster.state(), Some(ClusterState::Deploying));
        assert!(kube.secret("fleet", "edge").is_some());

        // not enough nodes yet: stays Deploying
        reconcile(trigger.clone(), ctx.clone()).await.unwrap();
        assert_eq!(
            kube.cluster("fleet", "edge").unwrap().state(),
            Some(ClusterState::Deploying)
        );

        // discovery records two nodes
        kube.patch_cluster_status("fleet", "edge", &ClusterStatusPatch::observed_nodes(2))
            .await
            .unwrap();
        reconcile(trigger.clone(), ctx.clone()).await.unwrap();
        assert_eq!(
            kube.cluster("fleet", "edge").unwrap().state(),
            Some(ClusterState::Provisioning)
        );

        // nothing moves it back
        kube.patch_cluster_status("fleet", "edge", &ClusterStatusPatch::observed_nodes(1))
            .await
            .unwrap();
        reconcile(trigger, ctx).await.unwrap();
        assert_eq!(
            kube.cluster("fleet", "edge").unwrap().state(),
            Some(ClusterState::Provisioning)
        );
    }
}
