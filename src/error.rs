//! Error taxonomy for a reconciliation pass.
//!
//! Everything here is fatal to the operation that raised it. The engine
//! swallows two classes of failure on its own: availability probes degrade
//! to "unavailable", and per-node member listings degrade to omission.
//! `PassError` is the engine-level rollup — any variant aborts the pass
//! before the artifact is written; membership mutations already applied
//! earlier in the pass stay applied.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A wire-level failure talking to a single etcd node.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The request did not complete within the per-call timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The endpoint was unreachable or the connection failed mid-flight.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The node answered, but not with a usable member listing.
    #[error("malformed member listing from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// A membership mutation (add/remove) that was rejected or never arrived.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The node answered the mutation with a non-success status.
    #[error("{operation} rejected by {url}: status {status}")]
    Rejected {
        operation: &'static str,
        url: String,
        status: u16,
    },

    /// Removal was asked for a member name the cluster does not know.
    #[error("no member named {name} known to {url}")]
    UnknownMember { name: String, url: String },

    /// The listing needed to resolve a member name failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Fleet inventory lookup failed; the fleet state is unknown and no
/// partial reconciliation is attempted.
#[derive(Debug, Error)]
#[error("fleet inventory lookup failed: {0}")]
pub struct InventoryError(pub String);

/// Engine-level failure of one reconciliation pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// The realized configuration is inconsistent and cannot be rendered.
    #[error("cannot render configuration: {0}")]
    Render(String),

    /// The artifact could not be persisted; no partial file is left behind.
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_error_wraps_protocol_error() {
        let err = MutationError::from(ProtocolError::Timeout {
            url: "http://10.0.0.1:2379/v2/members".into(),
        });
        assert!(matches!(err, MutationError::Protocol(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn pass_error_messages_name_the_offender() {
        let err = PassError::from(InventoryError("credentials expired".into()));
        assert_eq!(
            err.to_string(),
            "fleet inventory lookup failed: credentials expired"
        );

        let err = PassError::from(MutationError::UnknownMember {
            name: "i-0abc".into(),
            url: "http://10.0.0.1:2379/v2/members".into(),
        });
        assert!(err.to_string().contains("i-0abc"));
    }
}
