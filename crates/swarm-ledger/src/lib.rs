//! Pairing tokens and peer-to-peer ledger access for swarm
//!
//! Nodes pair with a cluster by joining a ledger scoped by the cluster's
//! bootstrap token. This crate issues those tokens, reads the pairing bucket
//! to discover nodes, and publishes the registration payload nodes install
//! from.

pub mod discovery;
pub mod edgevpn;
pub mod registrar;
pub mod session;
pub mod token;

pub use discovery::{LedgerDiscoveryClient, NodeDiscovery, DEFAULT_POLL_INTERVAL};
pub use edgevpn::EdgeVpnConnector;
pub use registrar::{LedgerRegistrar, NodeRegistrar, Registration};
pub use session::{
    paired_nodes, LedgerConnector, LedgerSession, LedgerSnapshot, PAIRING_BUCKET,
    RESERVED_DATA_KEY,
};
pub use token::{PairingToken, RandomTokenIssuer, TokenIssuer};
