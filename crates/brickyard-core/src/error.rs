//! Error types for Brickyard operations.

use thiserror::Error;

/// A specialized `Result` type for Brickyard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the allocation and replace-brick core.
#[derive(Debug, Error)]
pub enum Error {
    /// No device in the cluster can host a brick of the requested size.
    ///
    /// The allocation driver treats this as a signal to retry with the next
    /// smaller brick size; every other caller propagates it.
    #[error("no space")]
    NoSpace,

    /// The request would push the volume past its brick-count ceiling.
    #[error("maximum number of bricks per volume reached")]
    MaxBricks,

    /// The brick size search schedule is exhausted.
    #[error("no brick size candidates remain for the requested volume size")]
    NoSizeAvailable,

    /// A referenced entity does not exist, or persisted state diverged from
    /// the live cluster state.
    #[error("id not found")]
    NotFound,

    /// No admissible replacement device was found for a brick swap.
    #[error("no replacement device available")]
    NoReplacement,

    /// Replace-brick was requested on a durability type that cannot
    /// tolerate losing a brick.
    #[error("replace brick is not supported on {0} volumes")]
    UnsupportedDurability(String),

    /// The brick to be replaced is an active heal source.
    #[error("cannot replace brick {0} as it is a source for data to be healed")]
    HealSourceConflict(String),

    /// Too few peer bricks of the set are online to tolerate a replacement.
    #[error("cannot replace brick: only {online} of {required} required peer bricks are online")]
    QuorumNotMet {
        /// Peer bricks observed online.
        online: usize,
        /// Peer bricks the durability profile requires.
        required: usize,
    },

    /// A call into the storage daemon executor failed.
    #[error("executor failure: {0}")]
    External(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`Error::External`] from any displayable executor failure.
    #[must_use]
    pub fn external(e: impl std::fmt::Display) -> Self {
        Self::External(e.to_string())
    }

    /// Whether a cluster-selection loop may continue past this error and try
    /// the next candidate cluster.
    #[must_use]
    pub fn is_cluster_retryable(&self) -> bool {
        matches!(self, Self::NoSpace | Self::MaxBricks | Self::NoSizeAvailable | Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_message_carries_counts() {
        let err = Error::QuorumNotMet { online: 1, required: 2 };
        assert_eq!(
            err.to_string(),
            "cannot replace brick: only 1 of 2 required peer bricks are online"
        );
    }

    #[test]
    fn test_cluster_retryable() {
        assert!(Error::NoSpace.is_cluster_retryable());
        assert!(Error::MaxBricks.is_cluster_retryable());
        assert!(!Error::NoReplacement.is_cluster_retryable());
        assert!(!Error::Database("boom".into()).is_cluster_retryable());
    }

    #[test]
    fn test_external_helper() {
        let err = Error::external("connection refused");
        assert_eq!(err.to_string(), "executor failure: connection refused");
    }
}
