//! Swarm Operator - Cluster API infrastructure provider for self-pairing nodes

use std::sync::Arc;

use clap::Parser;

use swarm_cluster::{
    Context, NodeRegistrationLoop, NodeWatcher, ResyncScheduler, REGISTER_NODES, WATCH_NODES,
};
use swarm_common::kube_utils::create_client;
use swarm_common::telemetry::{init_telemetry, TelemetryConfig};
use swarm_ledger::{EdgeVpnConnector, LedgerConnector, LedgerDiscoveryClient, LedgerRegistrar};
use swarm_operator::config::Cli;
use swarm_operator::controller_runner::{build_controllers, spawn_loop};
use swarm_operator::startup::{
    cancel_on_signal, crd_manifests, ensure_crds_installed, resolve_capi_kinds,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install crypto provider - aws-lc-rs backs both rustls and token generation
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}. \
             The operator cannot talk to the API server without a working TLS implementation.",
            e
        );
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "swarm-operator".to_string(),
        format: cli.log_format,
    })?;

    run_controller(cli).await
}

/// Run the controllers and background loops until shutdown
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let client = create_client(None).await?;
    ensure_crds_installed(&client).await?;
    let capi_kinds = resolve_capi_kinds(&client).await;

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone())?;

    let period = cli.resync_period();
    let (watch_scheduler, watch_handle) = ResyncScheduler::new(WATCH_NODES, period);
    let (register_scheduler, register_handle) = ResyncScheduler::new(REGISTER_NODES, period);

    let ctx = Arc::new(
        Context::builder(client.clone())
            .capi_kinds(capi_kinds)
            .resync_handle(watch_handle)
            .resync_handle(register_handle)
            .build(),
    );

    let connector: Arc<dyn LedgerConnector> = Arc::new(EdgeVpnConnector::new(&cli.edgevpn_binary));
    let watcher = Arc::new(NodeWatcher::new(
        ctx.kube.clone(),
        Arc::new(LedgerDiscoveryClient::new(connector.clone())),
        ctx.events.clone(),
        cli.discovery_loop(),
    ));
    let registration = Arc::new(NodeRegistrationLoop::new(
        ctx.kube.clone(),
        Arc::new(LedgerRegistrar::new(connector)),
        ctx.events.clone(),
        cli.registration_loop(),
    ));

    tracing::info!(
        resync_secs = period.as_secs(),
        edgevpn = %cli.edgevpn_binary.display(),
        "Starting swarm operator"
    );

    let watch_task = spawn_loop(watch_scheduler, cancel.clone(), move |token| {
        let watcher = watcher.clone();
        async move { watcher.resync(&token).await }
    });
    let register_task = spawn_loop(register_scheduler, cancel.clone(), move |token| {
        let registration = registration.clone();
        async move { registration.resync(&token).await }
    });
    // serve clusters that already exist without waiting a full period
    ctx.wake_loops();

    let controllers = build_controllers(client, ctx, cancel.clone());
    futures::future::join_all(controllers).await;
    tracing::info!("controllers stopped");

    // controllers only return on shutdown; make sure the loops see it too
    cancel.cancel();
    let (watch_result, register_result) = tokio::join!(watch_task, register_task);
    watch_result??;
    register_result??;

    tracing::info!("swarm operator stopped");
    Ok(())
}
