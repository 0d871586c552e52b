use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::domain::detection_source::{DetectionSource, SourceError, SourceInfo};
use crate::shared::bounding_box::{BoundingBox, FrameSize};
use crate::shared::constants::DEFAULT_EXTRACTION_TIMEOUT_MS;
use crate::shared::detection::{Detection, Gender};

/// A detection run captured to disk by an external extractor.
///
/// ```json
/// {
///   "source": {"duration_seconds": 12.0, "frame_width": 1280, "frame_height": 720,
///              "extraction_timeout_ms": 3000},
///   "frames": [
///     {"timestamp": 0.0, "faces": [{"descriptor": [...], "bounding_box": {...}}]},
///     {"timestamp": 1.0, "error": "seek failed"},
///     {"timestamp": 2.0, "timed_out": true}
///   ]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub source: RecordingInfo,
    #[serde(default)]
    pub frames: Vec<RecordedFrame>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub duration_seconds: Option<f64>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    /// Per-frame deadline the extractor ran with; frames marked
    /// `timed_out` report it. Defaults to the standard extraction timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub faces: Vec<RecordedFace>,
    /// Extraction failed for this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extraction missed its deadline for this frame.
    #[serde(default)]
    pub timed_out: bool,
}

/// A face as stored in a recording; its timestamp is the frame's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFace {
    pub descriptor: Vec<f32>,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub expression: Option<BTreeMap<String, f64>>,
}

impl RecordedFace {
    fn at(&self, timestamp: f64) -> Detection {
        Detection {
            descriptor: self.descriptor.clone(),
            bounding_box: self.bounding_box,
            timestamp,
            age: self.age,
            gender: self.gender,
            expression: self.expression.clone(),
        }
    }
}

enum Origin {
    File(PathBuf),
    Memory(Recording),
}

/// Replays a [`Recording`] as if it were a live extractor.
///
/// The recording is only read in `initialize`; an unreadable or malformed
/// file surfaces as `ModelUnavailable`, the same way a live model that
/// failed to load would.
pub struct RecordedDetectionSource {
    origin: Origin,
    frames: Vec<RecordedFrame>,
    deadline: Duration,
}

impl RecordedDetectionSource {
    pub fn from_file(path: &Path) -> Self {
        Self {
            origin: Origin::File(path.to_path_buf()),
            frames: Vec::new(),
            deadline: Duration::from_millis(DEFAULT_EXTRACTION_TIMEOUT_MS),
        }
    }

    pub fn from_recording(recording: Recording) -> Self {
        Self {
            origin: Origin::Memory(recording),
            frames: Vec::new(),
            deadline: Duration::from_millis(DEFAULT_EXTRACTION_TIMEOUT_MS),
        }
    }

    fn load(&self) -> Result<Recording, SourceError> {
        match &self.origin {
            Origin::Memory(recording) => Ok(recording.clone()),
            Origin::File(path) => {
                let json = fs::read_to_string(path).map_err(|e| {
                    SourceError::ModelUnavailable(format!(
                        "cannot read recording {}: {e}",
                        path.display()
                    ))
                })?;
                serde_json::from_str(&json).map_err(|e| {
                    SourceError::ModelUnavailable(format!(
                        "malformed recording {}: {e}",
                        path.display()
                    ))
                })
            }
        }
    }

    /// Recorded frame timestamps, sorted.
    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.timestamp).collect()
    }
}

impl DetectionSource for RecordedDetectionSource {
    fn initialize(&mut self) -> Result<SourceInfo, SourceError> {
        let recording = self.load()?;
        let mut frames = recording.frames;
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let last_timestamp = frames.last().map_or(0.0, |f| f.timestamp);
        let frame_size = match (recording.source.frame_width, recording.source.frame_height) {
            (Some(width), Some(height)) => Some(FrameSize { width, height }),
            _ => None,
        };
        log::info!(
            "Loaded recording with {} frames ({} faces)",
            frames.len(),
            frames.iter().map(|f| f.faces.len()).sum::<usize>()
        );
        self.frames = frames;
        self.deadline = Duration::from_millis(
            recording
                .source
                .extraction_timeout_ms
                .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT_MS),
        );

        Ok(SourceInfo {
            duration_seconds: recording
                .source
                .duration_seconds
                .unwrap_or(last_timestamp)
                .max(last_timestamp),
            frame_size,
        })
    }

    fn extract(&mut self, timestamp: f64) -> Result<Vec<Detection>, SourceError> {
        let Some(frame) = self.frames.iter().find(|f| f.timestamp == timestamp) else {
            return Ok(Vec::new());
        };
        if frame.timed_out {
            return Err(SourceError::ExtractionTimeout {
                timestamp,
                deadline: self.deadline,
            });
        }
        if let Some(message) = &frame.error {
            return Err(SourceError::Extraction {
                timestamp,
                message: message.clone(),
            });
        }
        Ok(frame.faces.iter().map(|face| face.at(timestamp)).collect())
    }

    fn frame_timestamps(&self) -> Option<Vec<f64>> {
        Some(self.timestamps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32) -> RecordedFace {
        RecordedFace {
            descriptor: vec![x, 0.0],
            bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            age: None,
            gender: None,
            expression: None,
        }
    }

    fn frame(timestamp: f64, faces: Vec<RecordedFace>) -> RecordedFrame {
        RecordedFrame {
            timestamp,
            faces,
            error: None,
            timed_out: false,
        }
    }

    const SAMPLE: &str = r#"{
        "source": {"duration_seconds": 10.0, "frame_width": 1280, "frame_height": 720},
        "frames": [
            {"timestamp": 1.0, "faces": [
                {"descriptor": [0.1, 0.2], "bounding_box": {"x": 1.0, "y": 2.0, "width": 30.0, "height": 40.0},
                 "gender": "female", "age": 28.5}
            ]},
            {"timestamp": 0.0, "faces": []},
            {"timestamp": 2.0, "error": "seek failed"},
            {"timestamp": 3.0, "timed_out": true}
        ]
    }"#;

    #[test]
    fn test_initialize_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.json");
        fs::write(&path, SAMPLE).unwrap();
        let mut source = RecordedDetectionSource::from_file(&path);

        let info = source.initialize().unwrap();

        assert_eq!(info.duration_seconds, 10.0);
        assert_eq!(
            info.frame_size,
            Some(FrameSize {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(source.timestamps(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(source.frame_timestamps(), Some(vec![0.0, 1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_extract_stamps_frame_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.json");
        fs::write(&path, SAMPLE).unwrap();
        let mut source = RecordedDetectionSource::from_file(&path);
        source.initialize().unwrap();

        let detections = source.extract(1.0).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].timestamp, 1.0);
        assert_eq!(detections[0].gender, Some(Gender::Female));
        assert_eq!(detections[0].age, Some(28.5));
    }

    #[test]
    fn test_extract_reports_recorded_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.json");
        fs::write(&path, SAMPLE).unwrap();
        let mut source = RecordedDetectionSource::from_file(&path);
        source.initialize().unwrap();

        assert!(matches!(
            source.extract(2.0),
            Err(SourceError::Extraction { .. })
        ));
        let timeout = source.extract(3.0).unwrap_err();
        assert!(matches!(
            timeout,
            SourceError::ExtractionTimeout { deadline, .. }
                if deadline == Duration::from_millis(DEFAULT_EXTRACTION_TIMEOUT_MS)
        ));
        assert_eq!(timeout.to_string(), "extraction at 3.00s exceeded 3000ms");
    }

    #[test]
    fn test_timed_out_frame_reports_recorded_deadline() {
        let mut timed_out = frame(0.5, Vec::new());
        timed_out.timed_out = true;
        let mut source = RecordedDetectionSource::from_recording(Recording {
            source: RecordingInfo {
                extraction_timeout_ms: Some(750),
                ..RecordingInfo::default()
            },
            frames: vec![timed_out],
        });
        source.initialize().unwrap();

        let err = source.extract(0.5).unwrap_err();

        assert_eq!(err.to_string(), "extraction at 0.50s exceeded 750ms");
    }

    #[test]
    fn test_extract_unknown_timestamp_is_empty() {
        let mut source = RecordedDetectionSource::from_recording(Recording {
            source: RecordingInfo::default(),
            frames: vec![frame(0.0, vec![face(0.0)])],
        });
        source.initialize().unwrap();
        assert!(source.extract(0.5).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = RecordedDetectionSource::from_file(&dir.path().join("missing.json"));
        assert!(matches!(
            source.initialize(),
            Err(SourceError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.json");
        fs::write(&path, "[1, 2").unwrap();
        let mut source = RecordedDetectionSource::from_file(&path);
        assert!(matches!(
            source.initialize(),
            Err(SourceError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_duration_falls_back_to_last_frame() {
        let mut source = RecordedDetectionSource::from_recording(Recording {
            source: RecordingInfo::default(),
            frames: vec![frame(0.0, vec![]), frame(7.5, vec![face(1.0)])],
        });
        let info = source.initialize().unwrap();
        assert_eq!(info.duration_seconds, 7.5);
        assert!(info.frame_size.is_none());
    }
}
