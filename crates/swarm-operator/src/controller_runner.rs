//! Controller runner - builds the controller futures and background loops
//!
//! Controllers are returned as boxed futures so the caller decides how to
//! drive them. Background loops are spawned onto their own tasks, each with
//! its own scheduler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use swarm_cluster::{
    error_policy, machine_error_policy, reconcile, reconcile_machine, Context, ResyncScheduler,
};
use swarm_common::crd::{SwarmCluster, SwarmMachine};
use swarm_common::Error;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A controller future driven until shutdown
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the SwarmCluster and SwarmMachine controller futures
pub fn build_controllers(
    client: Client,
    ctx: Arc<Context>,
    cancel: CancellationToken,
) -> Vec<ControllerFuture> {
    let clusters: Api<SwarmCluster> = Api::all(client.clone());
    let machines: Api<SwarmMachine> = Api::all(client);

    tracing::info!("- SwarmCluster controller");
    tracing::info!("- SwarmMachine controller");

    let cluster_shutdown = cancel.clone();
    let cluster_ctrl = Controller::new(
        clusters,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .graceful_shutdown_on(async move { cluster_shutdown.cancelled().await })
    .run(reconcile, error_policy, ctx.clone())
    .for_each(log_reconcile_result("SwarmCluster"));

    let machine_ctrl = Controller::new(
        machines,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .graceful_shutdown_on(async move { cancel.cancelled().await })
    .run(reconcile_machine, machine_error_policy, ctx)
    .for_each(log_reconcile_result("SwarmMachine"));

    vec![Box::pin(cluster_ctrl), Box::pin(machine_ctrl)]
}

/// Spawn a background loop driving `resync` from `scheduler`.
///
/// A loop that stops with an error cancels `cancel`, taking the rest of the
/// operator down with it.
pub fn spawn_loop<F, Fut>(
    scheduler: ResyncScheduler,
    cancel: CancellationToken,
    mut resync: F,
) -> JoinHandle<Result<(), Error>>
where
    F: FnMut(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    let token = cancel.clone();
    tokio::spawn(async move {
        let name = scheduler.name().to_string();
        let result = scheduler
            .run(cancel.clone(), move || resync(token.clone()))
            .await;
        if let Err(e) = &result {
            tracing::error!(resync_loop = %name, error = %e, "background loop stopped");
            cancel.cancel();
        }
        result
    })
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
