use serde::{Deserialize, Serialize};

use crate::clustering::domain::centroid::Centroid;
use crate::clustering::domain::identity_error::IdentityError;
use crate::shared::constants::IDENTITY_LABEL_PREFIX;
use crate::shared::detection::Detection;

pub type IdentityId = u32;

/// Provenance entry for an identity absorbed by a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedFrom {
    pub id: IdentityId,
    pub label: String,
}

/// A cluster of detections believed to depict the same person.
///
/// Owned by a `ClusteringSession`; callers only ever see shared references.
/// Invariants: detections are sorted by timestamp and never empty, and the
/// centroid is the mean of their descriptors.
#[derive(Clone, Debug)]
pub struct Identity {
    id: IdentityId,
    label: String,
    centroid: Centroid,
    detections: Vec<Detection>,
    merged_from: Vec<MergedFrom>,
}

/// Serializable form of an identity. The centroid is not stored; it is
/// recomputed from the detections on restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub id: IdentityId,
    pub label: String,
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub merged_from: Vec<MergedFrom>,
}

impl Identity {
    pub(crate) fn new(id: IdentityId, detection: Detection) -> Self {
        Self {
            id,
            label: default_label(id),
            centroid: Centroid::new(&detection.descriptor),
            detections: vec![detection],
            merged_from: Vec::new(),
        }
    }

    /// Appends a detection whose timestamp is not earlier than the last one.
    pub(crate) fn push(&mut self, detection: Detection) {
        debug_assert!(self
            .detections
            .last()
            .map_or(true, |last| last.timestamp <= detection.timestamp));
        self.centroid.update(&detection.descriptor);
        self.detections.push(detection);
    }

    /// Takes over another identity's detections and provenance.
    ///
    /// The centroid is left stale; callers finish a batch of absorptions
    /// with [`Identity::recompute`].
    pub(crate) fn absorb(&mut self, source: Identity) {
        self.merged_from.push(MergedFrom {
            id: source.id,
            label: source.label,
        });
        self.merged_from.extend(source.merged_from);
        self.detections.extend(source.detections);
    }

    /// Re-sorts detections and recomputes the centroid from scratch.
    pub(crate) fn recompute(&mut self) {
        self.detections.sort_by(Detection::canonical_cmp);
        if let Some(centroid) =
            Centroid::from_descriptors(self.detections.iter().map(|d| d.descriptor.as_slice()))
        {
            self.centroid = centroid;
        }
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    pub fn id(&self) -> IdentityId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn centroid(&self) -> &Centroid {
        &self.centroid
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    pub fn merged_from(&self) -> &[MergedFrom] {
        &self.merged_from
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            id: self.id,
            label: self.label.clone(),
            detections: self.detections.clone(),
            merged_from: self.merged_from.clone(),
        }
    }

    /// Rebuilds an identity from a snapshot, re-sorting detections and
    /// recomputing the centroid.
    pub fn restore(snapshot: IdentitySnapshot) -> Result<Self, IdentityError> {
        let mut detections = snapshot.detections;
        detections.sort_by(Detection::canonical_cmp);
        let dimension = detections
            .first()
            .map(|d| d.descriptor.len())
            .ok_or(IdentityError::EmptyIdentity(snapshot.id))?;
        if let Some(bad) = detections
            .iter()
            .find(|d| d.descriptor.len() != dimension)
        {
            return Err(IdentityError::DimensionMismatch {
                expected: dimension,
                actual: bad.descriptor.len(),
            });
        }
        let centroid =
            Centroid::from_descriptors(detections.iter().map(|d| d.descriptor.as_slice()))
                .ok_or(IdentityError::EmptyIdentity(snapshot.id))?;
        Ok(Self {
            id: snapshot.id,
            label: snapshot.label,
            centroid,
            detections,
            merged_from: snapshot.merged_from,
        })
    }
}

fn default_label(id: IdentityId) -> String {
    format!("{IDENTITY_LABEL_PREFIX}-{id}")
}
