use std::time::Duration;

use thiserror::Error;

use crate::shared::bounding_box::FrameSize;
use crate::shared::detection::Detection;

#[derive(Error, Debug)]
pub enum SourceError {
    /// The embedding extractor could not be brought up. Fatal for a run.
    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),
    /// One frame's seek or extraction missed its deadline. Recoverable.
    #[error("extraction at {timestamp:.2}s exceeded {}ms", deadline.as_millis())]
    ExtractionTimeout { timestamp: f64, deadline: Duration },
    /// Any other single-frame failure. Recoverable.
    #[error("extraction at {timestamp:.2}s failed: {message}")]
    Extraction { timestamp: f64, message: String },
}

/// What a source knows about the video once initialised.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub duration_seconds: f64,
    pub frame_size: Option<FrameSize>,
}

/// Domain interface for the external seek + embed collaborator.
///
/// Implementations are stateful (an open decoder, a loaded model), hence
/// `&mut self`. `initialize` runs once before any frame is requested.
pub trait DetectionSource: Send {
    fn initialize(&mut self) -> Result<SourceInfo, SourceError>;

    /// Faces found in the frame at `timestamp` seconds; possibly none.
    fn extract(&mut self, timestamp: f64) -> Result<Vec<Detection>, SourceError>;

    /// Timestamps the source was already sampled at, if it dictates its
    /// own schedule (e.g. a replayed recording). `None` lets the caller
    /// sample at its configured interval.
    fn frame_timestamps(&self) -> Option<Vec<f64>> {
        None
    }
}
