//! Ledger session contract
//!
//! A session is a live, token-scoped view of the replicated ledger. Dropping
//! the session tears it down; implementations release their peer-to-peer
//! resources in `Drop` so every exit path of a caller frees them.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use swarm_common::Result;

/// Ledger bucket holding one entry per paired node
pub const PAIRING_BUCKET: &str = "pairing";

/// Key inside the pairing bucket carrying the registration payload, not a node
pub const RESERVED_DATA_KEY: &str = "data";

/// Full ledger contents: bucket -> key -> value
pub type LedgerSnapshot = BTreeMap<String, BTreeMap<String, Value>>;

/// A live ledger session scoped to one pairing token
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerSession: Send + Sync {
    /// Read the current ledger contents
    async fn current_data(&self) -> Result<LedgerSnapshot>;

    /// Write `value` under `bucket/key`
    async fn announce(&self, bucket: &str, key: &str, value: &Value) -> Result<()>;
}

/// Opens ledger sessions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    /// Join the ledger scoped by `token`
    async fn open(&self, token: &str) -> Result<Box<dyn LedgerSession>>;
}

/// Node identifiers present in the pairing bucket, excluding the reserved key
pub fn paired_nodes(snapshot: &LedgerSnapshot) -> BTreeSet<String> {
    snapshot
        .get(PAIRING_BUCKET)
        .map(|entries| {
            entries
                .keys()
                .filter(|k| k.as_str() != RESERVED_DATA_KEY)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(keys: &[&str]) -> LedgerSnapshot {
        let entries = keys
            .iter()
            .map(|k| (k.to_string(), json!({"seen": true})))
            .collect();
        BTreeMap::from([(PAIRING_BUCKET.to_string(), entries)])
    }

    #[test]
    fn story_reserved_data_key_is_not_a_node() {
        let nodes = paired_nodes(&snapshot(&["data", "node-A", "node-B"]));
        assert_eq!(
            nodes,
            BTreeSet::from(["node-A".to_string(), "node-B".to_string()])
        );
    }

    #[test]
    fn test_only_data_key_yields_nothing() {
        assert!(paired_nodes(&snapshot(&["data"])).is_empty());
    }

    #[test]
    fn test_missing_pairing_bucket_yields_nothing() {
        let mut snap = LedgerSnapshot::new();
        snap.insert("other".into(), BTreeMap::from([("node".into(), json!(1))]));
        assert!(paired_nodes(&snap).is_empty());
    }
}
