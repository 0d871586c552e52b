use std::collections::HashMap;
use std::hash::Hash;

use crate::aggregation::domain::identity_summary::{Demographic, IdentitySummary, Representative};
use crate::clustering::domain::identity::Identity;
use crate::shared::analysis_config::AnalysisConfig;
use crate::shared::bounding_box::{CropExpansion, FrameSize};
use crate::shared::detection::{Detection, Gender};
use crate::shared::time_range::{self, TimeRange};

/// Derives display summaries from an identity's detections.
///
/// Every method is a pure function of the detection list, so summaries can
/// be recomputed at any time (after assignment, after a merge, after a
/// restore) and always agree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aggregator {
    range_gap_seconds: f64,
    crop_expansion: CropExpansion,
}

impl Aggregator {
    pub fn new(range_gap_seconds: f64, crop_expansion: CropExpansion) -> Self {
        Self {
            range_gap_seconds,
            crop_expansion,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.range_gap_seconds, config.crop_expansion)
    }

    pub fn appearances(detections: &[Detection]) -> Vec<f64> {
        let mut timestamps: Vec<f64> = detections.iter().map(|d| d.timestamp).collect();
        timestamps.sort_by(f64::total_cmp);
        timestamps
    }

    pub fn time_ranges(&self, detections: &[Detection]) -> Vec<TimeRange> {
        time_range::coalesce(&Self::appearances(detections), self.range_gap_seconds)
    }

    pub fn demographic(detections: &[Detection]) -> Demographic {
        let gender = majority(detections.iter().filter_map(|d| d.gender));
        let expression = majority(
            detections
                .iter()
                .filter_map(|d| d.dominant_expression())
                .map(|(label, _)| label),
        )
        .map(str::to_string);

        let ages: Vec<f64> = detections
            .iter()
            .filter_map(|d| d.age)
            .filter(|age| age.is_finite())
            .collect();
        let avg_age = if ages.is_empty() {
            None
        } else {
            Some(ages.iter().sum::<f64>() / ages.len() as f64)
        };

        Demographic {
            gender,
            avg_age,
            expression,
        }
    }

    /// Best shot: the detection with the largest bounding box, on the
    /// assumption that a bigger face is closer and clearer. Ties go to the
    /// detection that sorts first in [`Detection::canonical_cmp`] order, so
    /// the choice does not depend on how the list was assembled. Blur, pose
    /// and occlusion are not considered.
    pub fn representative(detections: &[Detection]) -> Option<&Detection> {
        detections.iter().min_by(|a, b| {
            b.bounding_box
                .area()
                .total_cmp(&a.bounding_box.area())
                .then_with(|| a.canonical_cmp(b))
        })
    }

    /// Enriched record for one identity; `None` only for an identity with
    /// no detections, which a session never holds.
    pub fn summarize(
        &self,
        identity: &Identity,
        frame: Option<FrameSize>,
    ) -> Option<IdentitySummary> {
        let detections = identity.detections();
        let best = Self::representative(detections)?;
        Some(IdentitySummary {
            id: identity.id(),
            label: identity.label().to_string(),
            detection_count: detections.len(),
            representative: Representative {
                detection: best.clone(),
                crop: best.bounding_box.crop_rect(self.crop_expansion, frame),
            },
            demographic: Self::demographic(detections),
            appearances: Self::appearances(detections),
            time_ranges: self.time_ranges(detections),
            merged_from: identity.merged_from().to_vec(),
        })
    }

    /// Summaries sorted by descending detection count, then ascending id.
    pub fn summarize_all(
        &self,
        identities: &[Identity],
        frame: Option<FrameSize>,
    ) -> Vec<IdentitySummary> {
        let mut summaries: Vec<IdentitySummary> = identities
            .iter()
            .filter_map(|identity| self.summarize(identity, frame))
            .collect();
        summaries.sort_by(|a, b| {
            b.detection_count
                .cmp(&a.detection_count)
                .then(a.id.cmp(&b.id))
        });
        summaries
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// The single most frequent value; `None` when there are no votes or the
/// top count is shared.
fn majority<T: Eq + Hash>(votes: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for vote in votes {
        *counts.entry(vote).or_default() += 1;
    }
    let top = counts.values().copied().max()?;
    let mut leaders = counts.into_iter().filter(|(_, count)| *count == top);
    match (leaders.next(), leaders.next()) {
        (Some((value, _)), None) => Some(value),
        _ => None,
    }
}
