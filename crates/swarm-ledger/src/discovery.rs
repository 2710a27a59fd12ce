//! Node discovery through the pairing ledger
//!
//! Opens a session scoped to a cluster's bootstrap token and polls the
//! `pairing` bucket until at least one node shows up or the timeout elapses.
//! An empty result is not an error: it means nothing paired yet and the caller
//! retries on its next tick.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use swarm_common::{Error, Result};

use crate::session::{paired_nodes, LedgerConnector};
use crate::token::fingerprint_str;

/// Cadence at which the ledger is re-read while waiting for nodes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Finds nodes that paired against a token
#[async_trait]
pub trait NodeDiscovery: Send + Sync {
    /// Return the identifiers of paired nodes, or an empty set after `timeout`.
    ///
    /// Returns `Error::Cancelled` if `cancel` fires first.
    async fn discover(
        &self,
        token: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>>;
}

/// Ledger-backed discovery client
pub struct LedgerDiscoveryClient {
    connector: Arc<dyn LedgerConnector>,
    poll_interval: Duration,
}

impl LedgerDiscoveryClient {
    /// Create a client polling at [`DEFAULT_POLL_INTERVAL`]
    pub fn new(connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll cadence
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Instant `timeout` from now, or `None` when that is past the clock's range
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Sleep before the next poll, or `None` once `deadline` has passed
pub(crate) fn next_poll(deadline: Option<Instant>, poll_interval: Duration) -> Option<Duration> {
    let Some(deadline) = deadline else {
        return Some(poll_interval);
    };
    let now = Instant::now();
    (now < deadline).then(|| poll_interval.min(deadline - now))
}

#[async_trait]
impl NodeDiscovery for LedgerDiscoveryClient {
    async fn discover(
        &self,
        token: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>> {
        let token_id = fingerprint_str(token);
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled("discover")),
            session = self.connector.open(token) => session?,
        };
        debug!(token = %token_id, "ledger session opened");

        let deadline = deadline_after(timeout);
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled("discover")),
                snapshot = session.current_data() => snapshot,
            };

            match snapshot {
                Ok(snapshot) => {
                    let nodes = paired_nodes(&snapshot);
                    if !nodes.is_empty() {
                        info!(token = %token_id, count = nodes.len(), "paired nodes found");
                        return Ok(nodes);
                    }
                }
                Err(e) => debug!(token = %token_id, error = %e, "ledger read failed, polling again"),
            }

            let Some(wait) = next_poll(deadline, self.poll_interval) else {
                debug!(token = %token_id, "no nodes paired before timeout");
                return Ok(BTreeSet::new());
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled("discover")),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
