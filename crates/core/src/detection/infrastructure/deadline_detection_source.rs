use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::detection::domain::detection_source::{DetectionSource, SourceError, SourceInfo};
use crate::shared::detection::Detection;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type Response = (u64, Result<Vec<Detection>, SourceError>);

/// Decorator that runs extraction on a background worker and enforces a
/// per-frame deadline.
///
/// Layout: `caller → request channel → worker [inner.extract] → response channel`
///
/// A frame that misses its deadline is reported as `ExtractionTimeout`; the
/// worker's late answer for it is discarded when it eventually arrives, so
/// results are never attributed to the wrong frame. Requests are served in
/// order, so a hung frame also delays the frames queued behind it.
pub struct DeadlineDetectionSource {
    inner: Option<Box<dyn DetectionSource>>,
    deadline: Duration,
    worker: Option<Worker>,
    frame_timestamps: Option<Vec<f64>>,
    next_seq: u64,
}

struct Worker {
    requests: Sender<(u64, f64)>,
    responses: Receiver<Response>,
}

impl DeadlineDetectionSource {
    pub fn new(inner: Box<dyn DetectionSource>, deadline: Duration) -> Self {
        Self {
            inner: Some(inner),
            deadline,
            worker: None,
            frame_timestamps: None,
            next_seq: 0,
        }
    }

    fn spawn_worker(&mut self, mut inner: Box<dyn DetectionSource>) -> Result<(), SourceError> {
        let (request_tx, request_rx) =
            crossbeam_channel::bounded::<(u64, f64)>(DEFAULT_CHANNEL_CAPACITY);
        let (response_tx, response_rx) =
            crossbeam_channel::bounded::<Response>(DEFAULT_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name("detection-source".to_string())
            .spawn(move || {
                for (seq, timestamp) in request_rx.iter() {
                    let result = inner.extract(timestamp);
                    if response_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| SourceError::ModelUnavailable(format!("cannot start worker: {e}")))?;

        self.worker = Some(Worker {
            requests: request_tx,
            responses: response_rx,
        });
        Ok(())
    }
}

impl DetectionSource for DeadlineDetectionSource {
    fn initialize(&mut self) -> Result<SourceInfo, SourceError> {
        let mut inner = self.inner.take().ok_or_else(|| {
            SourceError::ModelUnavailable("detection source already initialised".to_string())
        })?;
        let info = match inner.initialize() {
            Ok(info) => info,
            Err(e) => {
                self.inner = Some(inner);
                return Err(e);
            }
        };
        self.frame_timestamps = inner.frame_timestamps();
        self.spawn_worker(inner)?;
        Ok(info)
    }

    fn extract(&mut self, timestamp: f64) -> Result<Vec<Detection>, SourceError> {
        let worker = self.worker.as_ref().ok_or_else(|| {
            SourceError::ModelUnavailable("detection source not initialised".to_string())
        })?;
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline_at = Instant::now() + self.deadline;
        let timed_out = SourceError::ExtractionTimeout {
            timestamp,
            deadline: self.deadline,
        };
        let stopped = || SourceError::Extraction {
            timestamp,
            message: "extraction worker stopped".to_string(),
        };

        match worker.requests.send_deadline((seq, timestamp), deadline_at) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => return Err(timed_out),
            Err(SendTimeoutError::Disconnected(_)) => return Err(stopped()),
        }

        loop {
            match worker.responses.recv_deadline(deadline_at) {
                Ok((s, result)) if s == seq => return result,
                Ok((stale, _)) => log::debug!("Discarding late result for request {stale}"),
                Err(RecvTimeoutError::Timeout) => return Err(timed_out),
                Err(RecvTimeoutError::Disconnected) => return Err(stopped()),
            }
        }
    }

    fn frame_timestamps(&self) -> Option<Vec<f64>> {
        match &self.inner {
            Some(inner) => inner.frame_timestamps(),
            None => self.frame_timestamps.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use std::collections::HashMap;

    /// Answers every frame with one detection; frames listed in `delays`
    /// sleep first.
    struct SlowSource {
        delays: HashMap<u64, Duration>,
        fail_init: bool,
    }

    impl SlowSource {
        fn new(delays: &[(f64, u64)]) -> Self {
            Self {
                delays: delays
                    .iter()
                    .map(|&(t, ms)| (t.to_bits(), Duration::from_millis(ms)))
                    .collect(),
                fail_init: false,
            }
        }
    }

    impl DetectionSource for SlowSource {
        fn initialize(&mut self) -> Result<SourceInfo, SourceError> {
            if self.fail_init {
                return Err(SourceError::ModelUnavailable("no weights".to_string()));
            }
            Ok(SourceInfo {
                duration_seconds: 5.0,
                frame_size: None,
            })
        }

        fn extract(&mut self, timestamp: f64) -> Result<Vec<Detection>, SourceError> {
            if let Some(delay) = self.delays.get(&timestamp.to_bits()) {
                std::thread::sleep(*delay);
            }
            Ok(vec![Detection::new(
                vec![timestamp as f32],
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                timestamp,
            )])
        }
    }

    #[test]
    fn test_passes_results_through() {
        let mut source =
            DeadlineDetectionSource::new(Box::new(SlowSource::new(&[])), Duration::from_secs(2));
        let info = source.initialize().unwrap();
        assert_eq!(info.duration_seconds, 5.0);

        for t in [0.0, 1.0, 2.0] {
            let detections = source.extract(t).unwrap();
            assert_eq!(detections.len(), 1);
            assert_eq!(detections[0].timestamp, t);
        }
    }

    #[test]
    fn test_slow_frame_times_out_and_late_result_is_discarded() {
        let mut source = DeadlineDetectionSource::new(
            Box::new(SlowSource::new(&[(1.0, 400)])),
            Duration::from_millis(250),
        );
        source.initialize().unwrap();

        assert_eq!(source.extract(0.0).unwrap()[0].timestamp, 0.0);
        assert!(matches!(
            source.extract(1.0),
            Err(SourceError::ExtractionTimeout { timestamp, .. }) if timestamp == 1.0
        ));
        // The worker finishes frame 1.0 late; its answer must not leak into 2.0.
        let detections = source.extract(2.0).unwrap();
        assert_eq!(detections[0].timestamp, 2.0);
    }

    #[test]
    fn test_initialize_failure_propagates() {
        let mut inner = SlowSource::new(&[]);
        inner.fail_init = true;
        let mut source = DeadlineDetectionSource::new(Box::new(inner), Duration::from_secs(1));
        assert!(matches!(
            source.initialize(),
            Err(SourceError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_extract_before_initialize_fails() {
        let mut source =
            DeadlineDetectionSource::new(Box::new(SlowSource::new(&[])), Duration::from_secs(1));
        assert!(matches!(
            source.extract(0.0),
            Err(SourceError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_double_initialize_fails() {
        let mut source =
            DeadlineDetectionSource::new(Box::new(SlowSource::new(&[])), Duration::from_secs(1));
        source.initialize().unwrap();
        assert!(source.initialize().is_err());
    }
}
