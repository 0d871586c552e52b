use serde::{Deserialize, Serialize};

use crate::clustering::domain::identity::{IdentityId, MergedFrom};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::detection::{Detection, Gender};
use crate::shared::time_range::TimeRange;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographic {
    /// Majority gender among detections that reported one; `None` when
    /// nothing was reported or the vote is tied.
    pub gender: Option<Gender>,
    pub avg_age: Option<f64>,
    /// Most frequent per-detection dominant expression, tie-broken the same
    /// way as gender.
    #[serde(default)]
    pub expression: Option<String>,
}

/// The best shot for an identity plus the rectangle to cut from its frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub detection: Detection,
    pub crop: BoundingBox,
}

/// Display-ready view of one identity, consumed by the presentation layer.
///
/// Self-contained and serializable, so callers can persist a result list
/// as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub id: IdentityId,
    pub label: String,
    pub detection_count: usize,
    pub representative: Representative,
    pub demographic: Demographic,
    pub appearances: Vec<f64>,
    pub time_ranges: Vec<TimeRange>,
    pub merged_from: Vec<MergedFrom>,
}

impl IdentitySummary {
    pub fn first_seen(&self) -> Option<f64> {
        self.appearances.first().copied()
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.appearances.last().copied()
    }

    /// Sum of all coalesced range lengths. Single-sample ranges count as 0.
    pub fn screen_time_seconds(&self) -> f64 {
        self.time_ranges.iter().map(TimeRange::duration).sum()
    }
}
