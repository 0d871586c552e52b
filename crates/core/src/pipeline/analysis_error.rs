use thiserror::Error;

use crate::clustering::domain::identity_error::IdentityError;
use crate::detection::domain::detection_source::SourceError;
use crate::shared::analysis_config::ConfigError;

/// Failures that stop an analysis run or a session command outright.
///
/// Per-frame problems are not here: they are counted in the run report
/// and logged.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The detection source could not be initialised; no clustering ran.
    #[error("detection source unavailable: {0}")]
    ModelUnavailable(#[source] SourceError),
    #[error("an analysis run is already in progress on this session")]
    RunInProgress,
    #[error("session state is poisoned by a panicked run")]
    LockPoisoned,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("invalid analysis config: {0}")]
    InvalidConfig(#[from] ConfigError),
}
