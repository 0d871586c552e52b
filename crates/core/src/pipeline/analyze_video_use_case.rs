use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::aggregation::domain::aggregator::Aggregator;
use crate::aggregation::domain::identity_summary::IdentitySummary;
use crate::clustering::domain::clustering_session::{Assignment, ClusteringSession};
use crate::clustering::domain::identity::IdentityId;
use crate::clustering::domain::identity_error::IdentityError;
use crate::detection::domain::detection_source::{DetectionSource, SourceError};
use crate::pipeline::analysis_error::AnalysisError;
use crate::pipeline::analysis_logger::AnalysisLogger;
use crate::pipeline::shared_session::SharedSession;
use crate::shared::analysis_config::{AnalysisConfig, AnalysisMode};
use crate::shared::detection::Detection;

/// Outcome of one analysis run. Always produced unless the source failed to
/// come up, even when every frame failed or the run was cancelled.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub frames_attempted: usize,
    pub frames_with_detections: usize,
    pub frames_timed_out: usize,
    pub frames_failed: usize,
    pub detections_assigned: usize,
    pub detections_rejected: usize,
    pub identities_created: usize,
    pub cancelled: bool,
    /// Set once when too few frames yielded detections to trust the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub identities: Vec<IdentitySummary>,
    /// Groups of identities close enough that they may be the same person.
    pub merge_suggestions: Vec<Vec<IdentityId>>,
}

impl AnalysisReport {
    /// Fraction of attempted frames that produced at least one detection.
    pub fn success_rate(&self) -> Option<f64> {
        (self.frames_attempted > 0)
            .then(|| self.frames_with_detections as f64 / self.frames_attempted as f64)
    }
}

/// Samples a video through a [`DetectionSource`] and clusters what it finds
/// into the registry behind a [`SharedSession`].
///
/// Each run starts from an empty registry. Per-frame failures are counted
/// and skipped; only a source that cannot initialise fails the run.
pub struct AnalyzeVideoUseCase {
    source: Box<dyn DetectionSource>,
    config: AnalysisConfig,
    logger: Box<dyn AnalysisLogger>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl AnalyzeVideoUseCase {
    pub fn new(
        source: Box<dyn DetectionSource>,
        config: AnalysisConfig,
        logger: Box<dyn AnalysisLogger>,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            source,
            config,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, shared: &SharedSession) -> Result<AnalysisReport, AnalysisError> {
        self.config.validate()?;
        let _run = shared.begin_run()?;

        let info = self
            .source
            .initialize()
            .map_err(AnalysisError::ModelUnavailable)?;
        let interval = self.config.sampling_interval_seconds;
        let timestamps = self
            .source
            .frame_timestamps()
            .unwrap_or_else(|| sample_timestamps(info.duration_seconds, interval));

        shared.with_session(|session| {
            *session = ClusteringSession::from_config(&self.config);
            if let Some(frame_size) = info.frame_size {
                session.set_frame_size(frame_size);
            }
        })?;

        let total = timestamps.len();
        self.logger.info(&format!(
            "Analyzing {total} frames over {:.1}s ({} mode, threshold {})",
            info.duration_seconds, self.config.mode, self.config.match_threshold
        ));

        let mut report = AnalysisReport::default();
        let mut pending: Vec<Detection> = Vec::new();

        for (i, &timestamp) in timestamps.iter().enumerate() {
            if self.cancelled.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }

            let extract_start = Instant::now();
            let extracted = self.source.extract(timestamp);
            self.logger
                .timing("extract", extract_start.elapsed().as_secs_f64() * 1000.0);
            report.frames_attempted += 1;

            match extracted {
                Ok(detections) => {
                    self.logger.metric("faces_per_frame", detections.len() as f64);
                    if !detections.is_empty() {
                        report.frames_with_detections += 1;
                    }
                    match self.config.mode {
                        AnalysisMode::Batch => pending.extend(detections),
                        AnalysisMode::Online => {
                            let assign_start = Instant::now();
                            let results = shared.with_session(|session| {
                                detections
                                    .into_iter()
                                    .map(|d| session.assign(d))
                                    .collect::<Vec<_>>()
                            })?;
                            self.logger
                                .timing("assign", assign_start.elapsed().as_secs_f64() * 1000.0);
                            self.tally(&results, &mut report);
                        }
                    }
                }
                Err(e @ SourceError::ExtractionTimeout { .. }) => {
                    report.frames_timed_out += 1;
                    self.logger.warn(&format!("Skipping frame: {e}"));
                }
                Err(e) => {
                    report.frames_failed += 1;
                    self.logger.warn(&format!("Skipping frame: {e}"));
                }
            }

            if !self.report_progress(i + 1, total) {
                report.cancelled = true;
                break;
            }
        }

        if !pending.is_empty() {
            let assign_start = Instant::now();
            let results = shared.with_session(|session| session.assign_batch(pending))?;
            self.logger
                .timing("assign", assign_start.elapsed().as_secs_f64() * 1000.0);
            self.tally(&results, &mut report);
        }

        if report.cancelled {
            self.logger.info(&format!(
                "Analysis cancelled after {}/{total} frames; keeping partial identities",
                report.frames_attempted
            ));
        }

        let aggregator = Aggregator::from_config(&self.config);
        let suggestion_threshold = self.config.merge_suggestion_threshold;
        let (identities, merge_suggestions) = shared.with_session(|session| {
            (
                aggregator.summarize_all(session.identities(), session.frame_size()),
                session.merge_candidates(suggestion_threshold),
            )
        })?;
        report.identities_created = identities.len();
        report.identities = identities;
        report.merge_suggestions = merge_suggestions;

        if report.identities.is_empty() {
            self.logger.info("No faces found; returning an empty identity list");
        }
        if let Some(rate) = report.success_rate() {
            if rate < self.config.min_success_rate {
                let warning = format!(
                    "Only {} of {} sampled frames yielded faces ({:.0}%); results may be incomplete",
                    report.frames_with_detections,
                    report.frames_attempted,
                    rate * 100.0
                );
                self.logger.warn(&warning);
                report.warning = Some(warning);
            }
        }

        self.logger.info(&format!(
            "Found {} identities from {} detections",
            report.identities_created, report.detections_assigned
        ));
        self.logger.summary();
        Ok(report)
    }

    fn tally(
        &mut self,
        results: &[Result<Assignment, IdentityError>],
        report: &mut AnalysisReport,
    ) {
        for result in results {
            match result {
                Ok(_) => report.detections_assigned += 1,
                Err(e) => {
                    report.detections_rejected += 1;
                    self.logger.warn(&format!("Rejected detection: {e}"));
                }
            }
        }
    }

    /// Returns `false` when the caller asked to stop.
    fn report_progress(&mut self, current: usize, total: usize) -> bool {
        self.logger.progress(current, total);
        match self.on_progress {
            Some(ref callback) => callback(current, total),
            None => true,
        }
    }
}

/// `0, interval, 2 * interval, ...` strictly below `duration`.
fn sample_timestamps(duration: f64, interval: f64) -> Vec<f64> {
    let valid = duration.is_finite() && duration > 0.0 && interval.is_finite() && interval > 0.0;
    if !valid {
        return Vec::new();
    }
    (0u64..)
        .map(|i| i as f64 * interval)
        .take_while(|&t| t < duration)
        .collect()
}
