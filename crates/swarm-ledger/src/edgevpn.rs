//! edgevpn-backed ledger connector
//!
//! Each session runs its own `edgevpn api` process joined with the session's
//! token and talks to it over its loopback HTTP API. The process is killed
//! when the session is dropped.
//!
//! Loopback ports are reserved in-process for the lifetime of a session, so
//! concurrent sessions never probe each other's API. A process that exits
//! during startup (typically because another program took the port first) is
//! respawned on a fresh port.

use std::collections::BTreeSet;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use swarm_common::{Error, Result};

use crate::session::{LedgerConnector, LedgerSession, LedgerSnapshot};

/// Environment variable edgevpn reads its network token from
pub const TOKEN_ENV: &str = "EDGEVPNTOKEN";

const LEDGER_PATH: &str = "api/ledger";
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_millis(250);
const SPAWN_ATTEMPTS: u32 = 3;
const PORT_PICK_ATTEMPTS: u32 = 16;

/// Loopback ports held by live sessions of this process
static RESERVED_PORTS: Mutex<BTreeSet<u16>> = Mutex::new(BTreeSet::new());

/// How an `edgevpn api` process came out of startup
enum Startup {
    Ready,
    Exited(String),
}

/// Connector spawning `edgevpn api` per session
#[derive(Clone, Debug)]
pub struct EdgeVpnConnector {
    binary: PathBuf,
    startup_timeout: Duration,
    http: reqwest::Client,
}

impl EdgeVpnConnector {
    /// Create a connector running `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            startup_timeout: Duration::from_secs(30),
            http: reqwest::Client::new(),
        }
    }

    /// Override how long to wait for the API to come up
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    async fn wait_ready(&self, child: &mut Child, base: &Url) -> Result<Startup> {
        let probe = ledger_url(base, &[])?;
        let deadline = Instant::now()
            .checked_add(self.startup_timeout)
            .ok_or_else(|| Error::ledger("open", "startup timeout out of range"))?;
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| Error::ledger("open", format!("failed to poll edgevpn: {}", e)))?
            {
                return Ok(Startup::Exited(status.to_string()));
            }
            match self.http.get(probe.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(Startup::Ready),
                Ok(resp) => debug!(status = %resp.status(), "edgevpn api not ready"),
                Err(e) => debug!(error = %e, "edgevpn api not reachable yet"),
            }
            if Instant::now() >= deadline {
                return Err(Error::ledger(
                    "open",
                    format!(
                        "edgevpn api did not become ready within {}s",
                        self.startup_timeout.as_secs()
                    ),
                ));
            }
            tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
        }
    }

    fn spawn(&self, token: &str, listen: &str) -> Result<Child> {
        Command::new(&self.binary)
            .arg("api")
            .arg("--listen")
            .arg(listen)
            .env(TOKEN_ENV, token)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ledger(
                    "open",
                    format!("failed to spawn {}: {}", self.binary.display(), e),
                )
            })
    }
}

#[async_trait]
impl LedgerConnector for EdgeVpnConnector {
    async fn open(&self, token: &str) -> Result<Box<dyn LedgerSession>> {
        let mut last_exit = String::new();
        for attempt in 1..=SPAWN_ATTEMPTS {
            let port = PortReservation::acquire()?;
            let listen = format!("127.0.0.1:{}", port.port());
            let base = Url::parse(&format!("http://{}/", listen))
                .map_err(|e| Error::ledger("open", format!("invalid api address: {}", e)))?;

            let mut child = self.spawn(token, &listen)?;
            match self.wait_ready(&mut child, &base).await? {
                Startup::Ready => {
                    debug!(listen = %listen, "edgevpn session ready");
                    return Ok(Box::new(EdgeVpnSession {
                        child,
                        base,
                        http: self.http.clone(),
                        _port: port,
                    }));
                }
                Startup::Exited(status) => {
                    warn!(listen = %listen, attempt, %status, "edgevpn exited during startup");
                    last_exit = status;
                }
            }
        }
        Err(Error::ledger(
            "open",
            format!(
                "edgevpn exited during startup {} times, last: {}",
                SPAWN_ATTEMPTS, last_exit
            ),
        ))
    }
}

/// A running `edgevpn api` process
pub struct EdgeVpnSession {
    child: Child,
    base: Url,
    http: reqwest::Client,
    _port: PortReservation,
}

#[async_trait]
impl LedgerSession for EdgeVpnSession {
    async fn current_data(&self) -> Result<LedgerSnapshot> {
        let url = ledger_url(&self.base, &[])?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::ledger("snapshot", e.to_string()))?;
        resp.json::<LedgerSnapshot>()
            .await
            .map_err(|e| Error::ledger("snapshot", format!("invalid ledger body: {}", e)))
    }

    async fn announce(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| Error::serialization_for_kind("LedgerValue", e.to_string()))?;
        let url = ledger_url(&self.base, &[bucket, key, &encoded])?;
        self.http
            .put(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::ledger("announce", e.to_string()))?;
        Ok(())
    }
}

impl Drop for EdgeVpnSession {
    fn drop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "failed to stop edgevpn session");
        }
    }
}

/// `base/api/ledger/<segments...>` with each segment percent-encoded
fn ledger_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::ledger("url", "api address cannot be a base"))?;
        path.clear();
        path.extend(LEDGER_PATH.split('/'));
        path.extend(segments);
    }
    Ok(url)
}

/// A loopback port no other session of this process will be handed
struct PortReservation(u16);

impl PortReservation {
    fn acquire() -> Result<Self> {
        for _ in 0..PORT_PICK_ATTEMPTS {
            let port = free_loopback_port()?;
            let mut reserved = RESERVED_PORTS
                .lock()
                .map_err(|_| Error::ledger("open", "port reservations poisoned"))?;
            if reserved.insert(port) {
                return Ok(Self(port));
            }
        }
        Err(Error::ledger("open", "no unreserved loopback port"))
    }

    fn port(&self) -> u16 {
        self.0
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        if let Ok(mut reserved) = RESERVED_PORTS.lock() {
            reserved.remove(&self.0);
        }
    }
}

fn free_loopback_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| Error::ledger("open", format!("no free loopback port: {}", e)))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| Error::ledger("open", e.to_string()))
}
