use thiserror::Error;

use crate::clustering::domain::identity::IdentityId;

/// Failures of clustering-session operations. Every variant is raised
/// before any state is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentityError {
    #[error("unknown identity: {0}")]
    UnknownIdentity(IdentityId),
    #[error("descriptor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("descriptor is empty")]
    EmptyDescriptor,
    #[error("descriptor contains non-finite values")]
    NonFiniteDescriptor,
    #[error("detection timestamp {0} is not a finite number")]
    InvalidTimestamp(f64),
    #[error("detection at {timestamp}s arrived after {previous}s; assignment must be in timestamp order")]
    OutOfOrder { previous: f64, timestamp: f64 },
    #[error("merge requires at least one source identity")]
    NoMergeSources,
    #[error("identity {0} cannot be merged into itself")]
    SelfMerge(IdentityId),
    #[error("identity {0} listed more than once as a merge source")]
    DuplicateMergeSource(IdentityId),
    #[error("identity {0} has no detections")]
    EmptyIdentity(IdentityId),
    #[error("match threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),
    #[error("identity id {0} appears more than once")]
    DuplicateIdentity(IdentityId),
}
