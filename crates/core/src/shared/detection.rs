use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// One face found in one sampled frame.
///
/// The descriptor is an opaque embedding from the external recognition
/// model; Euclidean distance between descriptors approximates facial
/// similarity. Detections are immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub descriptor: Vec<f32>,
    pub bounding_box: BoundingBox,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<BTreeMap<String, f64>>,
}

impl Detection {
    pub fn new(descriptor: Vec<f32>, bounding_box: BoundingBox, timestamp: f64) -> Self {
        Self {
            descriptor,
            bounding_box,
            timestamp,
            age: None,
            gender: None,
            expression: None,
        }
    }

    pub fn with_age(mut self, age: f64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_expression(mut self, expression: BTreeMap<String, f64>) -> Self {
        self.expression = Some(expression);
        self
    }

    /// Total order used wherever detections are sorted or tied: timestamp,
    /// then box position and size, then descriptor, then age. Two detections
    /// compare equal only when all of those are identical, so the result
    /// never depends on the order detections were handed in.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.bounding_box, &other.bounding_box);
        self.timestamp
            .total_cmp(&other.timestamp)
            .then_with(|| a.x.total_cmp(&b.x))
            .then_with(|| a.y.total_cmp(&b.y))
            .then_with(|| a.width.total_cmp(&b.width))
            .then_with(|| a.height.total_cmp(&b.height))
            .then_with(|| {
                self.descriptor
                    .iter()
                    .zip(&other.descriptor)
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|o| o.is_ne())
                    .unwrap_or_else(|| self.descriptor.len().cmp(&other.descriptor.len()))
            })
            .then_with(|| match (self.age, other.age) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            })
    }

    /// Highest-scoring expression label, if the model reported any.
    pub fn dominant_expression(&self) -> Option<(&str, f64)> {
        self.expression
            .as_ref()?
            .iter()
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(label, score)| (label.as_str(), *score))
    }
}
