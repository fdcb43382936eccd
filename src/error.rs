use std::fmt;

use thiserror::Error;

use crate::{
    git::{EncodeError, IdError, LinkParseError, ObjectId},
    ipld::ContentAddress,
};

/// Boxed error from a collaborator (object source, ledger, DAG store,
/// observer). Collaborators report `anyhow` errors; the push keeps their
/// context chain intact behind this box.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which ledger call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    Check,
    Record,
}

impl fmt::Display for LedgerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerOp::Check => write!(f, "check"),
            LedgerOp::Record => write!(f, "record"),
        }
    }
}

/// Errors that abort a push.
///
/// Every variant is fatal: the run stops at the first one and the
/// completion signal carries it back to the caller.
#[derive(Debug, Error)]
pub enum PushError {
    /// Identifier text could not be decoded into a 20-byte digest.
    #[error(transparent)]
    MalformedIdentifier(#[from] IdError),

    /// Ledger existence check or record failed.
    #[error("ledger {op} failed for {id}")]
    Ledger {
        id: ObjectId,
        op: LedgerOp,
        #[source]
        source: BoxError,
    },

    /// Object missing from, or unreadable in, the local object store.
    #[error("failed to read object {id}")]
    SourceRead {
        id: ObjectId,
        #[source]
        source: BoxError,
    },

    /// Object could not be put into canonical form.
    #[error("failed to encode object {id}")]
    Encoding {
        id: ObjectId,
        #[source]
        source: EncodeError,
    },

    /// DAG store unreachable or rejected the object.
    #[error("failed to put object {id} into the DAG store")]
    Network {
        id: ObjectId,
        #[source]
        source: BoxError,
    },

    /// DAG store reported a CID other than the one derived from the git id.
    #[error("CIDs don't match for {id}: expected {expected}, got {reported}")]
    AddressMismatch {
        id: ObjectId,
        expected: ContentAddress,
        reported: ContentAddress,
    },

    /// Canonical bytes are malformed for their declared kind.
    #[error("failed to parse links of {id}")]
    LinkParse {
        id: ObjectId,
        #[source]
        source: LinkParseError,
    },

    /// Per-object observer returned an error.
    #[error("observer failed for {id}")]
    Observer {
        id: ObjectId,
        #[source]
        source: BoxError,
    },

    #[error("push cancelled before processing {id}")]
    Cancelled { id: ObjectId },

    /// Worker thread went away without sending a result (it panicked).
    #[error("push worker exited without reporting a result")]
    WorkerLost,
}

impl PushError {
    pub(crate) fn ledger(id: ObjectId, op: LedgerOp, err: anyhow::Error) -> Self {
        PushError::Ledger {
            id,
            op,
            source: err.into(),
        }
    }

    /// The object the run was working on when it failed, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            PushError::Ledger { id, .. }
            | PushError::SourceRead { id, .. }
            | PushError::Encoding { id, .. }
            | PushError::Network { id, .. }
            | PushError::AddressMismatch { id, .. }
            | PushError::LinkParse { id, .. }
            | PushError::Observer { id, .. }
            | PushError::Cancelled { id } => Some(*id),
            PushError::MalformedIdentifier(_) | PushError::WorkerLost => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_addresses() {
        let id: ObjectId = "9daeafb9864cf43055ae93beb0afd6c7d144bfa4".parse().unwrap();
        let other: ObjectId = "0000000000000000000000000000000000000001".parse().unwrap();
        let expected = ContentAddress::for_object(&id);
        let reported = ContentAddress::for_object(&other);

        let err = PushError::AddressMismatch {
            id,
            expected,
            reported,
        };
        let message = err.to_string();
        assert!(message.contains(&expected.to_string()));
        assert!(message.contains(&reported.to_string()));
        assert!(message.contains("9daeafb9864cf43055ae93beb0afd6c7d144bfa4"));
        assert_eq!(err.object_id(), Some(id));
    }

    #[test]
    fn test_ledger_error_keeps_context_chain() {
        let id: ObjectId = "9daeafb9864cf43055ae93beb0afd6c7d144bfa4".parse().unwrap();
        let inner = anyhow::anyhow!("disk full").context("Failed to append ledger entry");
        let err = PushError::ledger(id, LedgerOp::Record, inner);

        assert_eq!(
            err.to_string(),
            "ledger record failed for 9daeafb9864cf43055ae93beb0afd6c7d144bfa4"
        );
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert!(chain.contains("Failed to append ledger entry"));
        assert!(chain.contains("disk full"));
    }
}
