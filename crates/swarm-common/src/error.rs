//! Error types for the swarm operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context (cluster, ledger operation, component)
//! needed to tell a transient object-store hiccup from a condition that
//! must stop a background loop.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for swarm operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
    },

    /// Peer-to-peer ledger error (session start, snapshot read, announce)
    #[error("ledger error [{operation}]: {message}")]
    Ledger {
        /// Ledger operation that failed (e.g., "open", "snapshot", "announce")
        operation: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// The governing cancellation token fired while the operation was in flight
    #[error("operation cancelled: {operation}")]
    Cancelled {
        /// Operation that observed the cancellation
        operation: String,
    },

    /// Unrecoverable error: the caller must stop rather than retry
    #[error("fatal error [{context}]: {message}")]
    Fatal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "watch-nodes")
        context: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "scheduler")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a ledger error for the given operation
    pub fn ledger(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Ledger {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a fatal error with context
    pub fn fatal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fatal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// HTTP status code of the underlying API error, if any
    fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => Some(ae.code),
            _ => None,
        }
    }

    /// True if the object store reported the object as missing (404)
    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    /// True if an optimistic-concurrency precondition failed (409 on patch/update)
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 409 && ae.reason != "AlreadyExists",
            _ => false,
        }
    }

    /// True if a create lost a race against another writer
    pub fn is_already_exists(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 409 && ae.reason == "AlreadyExists",
            _ => false,
        }
    }

    /// True if the caller must stop instead of retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal { .. })
    }

    /// Check if this error is retryable
    ///
    /// Conflicts and transient API failures are retried on the next tick or
    /// reconcile. Validation, serialization and fatal errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => ae.code == 409 || !(400..500).contains(&ae.code),
                _ => true,
            },
            Error::Validation { .. } => false,
            Error::Ledger { .. } => true,
            Error::Serialization { .. } => false,
            Error::Cancelled { .. } => false,
            Error::Fatal { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. } => Some(cluster),
            _ => None,
        }
    }
}
