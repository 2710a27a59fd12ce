//! Node self-registration
//!
//! Publishes the install payload (device, cloud-config, options) under the
//! reserved `pairing/data` key so a booting node that joins the ledger with
//! the same token can pick it up and pair.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use swarm_common::{Error, Result};

use crate::discovery::{deadline_after, next_poll, DEFAULT_POLL_INTERVAL};
use crate::session::{paired_nodes, LedgerConnector, PAIRING_BUCKET, RESERVED_DATA_KEY};
use crate::token::fingerprint_str;

/// Payload announced to registering nodes
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Registration {
    /// Pairing token scoping the ledger session
    #[serde(skip)]
    pub token: String,
    /// Install device selector
    pub device: String,
    /// Cloud-config the node installs with
    #[serde(rename = "cc")]
    pub cloud_config: String,
    /// Free-form options
    pub options: BTreeMap<String, String>,
}

impl Registration {
    /// JSON value announced under `pairing/data`
    pub fn payload(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| Error::serialization_for_kind("Registration", e.to_string()))
    }
}

/// Sends registration payloads to nodes waiting to pair
#[async_trait]
pub trait NodeRegistrar: Send + Sync {
    /// Publish `registration` and keep it available for up to `timeout`.
    ///
    /// Returns once a node has paired, the timeout elapses, or `cancel` fires.
    async fn send(
        &self,
        registration: &Registration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Registrar that announces over a ledger session
pub struct LedgerRegistrar {
    connector: Arc<dyn LedgerConnector>,
    poll_interval: Duration,
}

impl LedgerRegistrar {
    /// Create a registrar over `connector`
    pub fn new(connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[async_trait]
impl NodeRegistrar for LedgerRegistrar {
    async fn send(
        &self,
        registration: &Registration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let token_id = fingerprint_str(&registration.token);
        let payload = registration.payload()?;
        let session = self.connector.open(&registration.token).await?;
        session
            .announce(PAIRING_BUCKET, RESERVED_DATA_KEY, &payload)
            .await?;
        info!(token = %token_id, device = %registration.device, "registration payload announced");

        let deadline = deadline_after(timeout);
        loop {
            let Some(wait) = next_poll(deadline, self.poll_interval) else {
                debug!(token = %token_id, "no node paired while payload was published");
                return Ok(());
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled("register")),
                _ = tokio::time::sleep(wait) => {}
            }
            match session.current_data().await {
                Ok(snapshot) if !paired_nodes(&snapshot).is_empty() => {
                    debug!(token = %token_id, "node paired, closing registration session");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!(token = %token_id, error = %e, "ledger read failed"),
            }
        }
    }
}
