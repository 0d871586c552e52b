use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::clustering::domain::identity::{Identity, IdentityId, IdentitySnapshot};
use crate::clustering::domain::identity_error::IdentityError;
use crate::clustering::domain::identity_links::IdentityLinks;
use crate::shared::analysis_config::AnalysisConfig;
use crate::shared::bounding_box::FrameSize;
use crate::shared::constants::SESSION_SNAPSHOT_VERSION;
use crate::shared::detection::Detection;

/// Result of assigning one detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assignment {
    pub identity_id: IdentityId,
    /// True when the detection opened a new identity.
    pub created: bool,
    /// Distance to the nearest centroid at assignment time, if any
    /// identity existed.
    pub nearest_distance: Option<f64>,
}

/// Owns the live identity set for one analysis run.
///
/// Detections are matched to the nearest centroid; a match closer than
/// `match_threshold` joins that identity, anything else opens a new one.
/// Each assignment is complete and self-consistent, so a session stopped
/// between two calls holds valid identities.
#[derive(Clone, Debug)]
pub struct ClusteringSession {
    pub(super) match_threshold: f64,
    /// Live identities in creation (ascending id) order.
    pub(super) identities: Vec<Identity>,
    pub(super) next_id: IdentityId,
    pub(super) dimension: Option<usize>,
    pub(super) last_timestamp: Option<f64>,
    pub(super) frame_size: Option<FrameSize>,
}

/// Serializable state of a session, for save/restore between editing
/// sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub match_threshold: f64,
    #[serde(default)]
    pub frame_size: Option<FrameSize>,
    pub next_id: IdentityId,
    pub identities: Vec<IdentitySnapshot>,
}

impl ClusteringSession {
    pub fn new(match_threshold: f64) -> Self {
        Self {
            match_threshold,
            identities: Vec::new(),
            next_id: 1,
            dimension: None,
            last_timestamp: None,
            frame_size: None,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.match_threshold)
    }

    /// Assigns one detection to its nearest identity or opens a new one.
    ///
    /// Detections must arrive in non-decreasing timestamp order and share
    /// the descriptor dimension of the first detection. Rejected
    /// detections leave the session untouched.
    pub fn assign(&mut self, detection: Detection) -> Result<Assignment, IdentityError> {
        self.validate(&detection)?;

        let nearest = self.nearest(&detection.descriptor);
        self.dimension = Some(detection.descriptor.len());
        self.last_timestamp = Some(detection.timestamp);

        match nearest {
            Some((idx, distance)) if distance < self.match_threshold => {
                let identity = &mut self.identities[idx];
                identity.push(detection);
                log::debug!(
                    "Assigned detection to {} (distance {distance:.3}, {} detections)",
                    identity.label(),
                    identity.detection_count()
                );
                Ok(Assignment {
                    identity_id: identity.id(),
                    created: false,
                    nearest_distance: Some(distance),
                })
            }
            _ => {
                let id = self.next_id;
                self.next_id += 1;
                let identity = Identity::new(id, detection);
                log::debug!(
                    "Created {} (nearest distance {:?})",
                    identity.label(),
                    nearest.map(|(_, d)| d)
                );
                self.identities.push(identity);
                Ok(Assignment {
                    identity_id: id,
                    created: true,
                    nearest_distance: nearest.map(|(_, d)| d),
                })
            }
        }
    }

    /// Batch mode: sorts into canonical detection order and assigns in one
    /// pass, so faces sharing a frame are assigned the same way whatever
    /// order they arrived in.
    ///
    /// Returns one result per input detection, in assignment order; a
    /// rejected detection does not stop the rest of the batch.
    pub fn assign_batch(
        &mut self,
        mut detections: Vec<Detection>,
    ) -> Vec<Result<Assignment, IdentityError>> {
        detections.sort_by(Detection::canonical_cmp);
        detections.into_iter().map(|d| self.assign(d)).collect()
    }

    fn validate(&self, detection: &Detection) -> Result<(), IdentityError> {
        let descriptor = &detection.descriptor;
        if descriptor.is_empty() {
            return Err(IdentityError::EmptyDescriptor);
        }
        if let Some(expected) = self.dimension {
            if descriptor.len() != expected {
                return Err(IdentityError::DimensionMismatch {
                    expected,
                    actual: descriptor.len(),
                });
            }
        }
        if descriptor.iter().any(|x| !x.is_finite()) {
            return Err(IdentityError::NonFiniteDescriptor);
        }
        if !detection.timestamp.is_finite() {
            return Err(IdentityError::InvalidTimestamp(detection.timestamp));
        }
        if let Some(previous) = self.last_timestamp {
            if detection.timestamp < previous {
                return Err(IdentityError::OutOfOrder {
                    previous,
                    timestamp: detection.timestamp,
                });
            }
        }
        Ok(())
    }

    /// Index and distance of the closest centroid; ties keep the lowest id.
    fn nearest(&self, descriptor: &[f32]) -> Option<(usize, f64)> {
        self.identities
            .iter()
            .enumerate()
            .map(|(idx, identity)| (idx, identity.centroid().distance_to(descriptor)))
            .fold(None, |best, (idx, distance)| match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((idx, distance)),
            })
    }

    pub fn identity(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.iter().find(|i| i.id() == id)
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn detection_count(&self) -> usize {
        self.identities.iter().map(Identity::detection_count).sum()
    }

    pub fn match_threshold(&self) -> f64 {
        self.match_threshold
    }

    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    pub fn set_frame_size(&mut self, frame_size: FrameSize) {
        self.frame_size = Some(frame_size);
    }

    /// Replaces an identity's display label.
    pub fn relabel(
        &mut self,
        id: IdentityId,
        label: impl Into<String>,
    ) -> Result<(), IdentityError> {
        let identity = self
            .identities
            .iter_mut()
            .find(|i| i.id() == id)
            .ok_or(IdentityError::UnknownIdentity(id))?;
        identity.set_label(label.into());
        Ok(())
    }

    /// Groups of live identities whose centroids lie within `threshold` of
    /// each other (transitively). Singletons are omitted.
    ///
    /// Offered to the user as merge suggestions; nothing is merged here.
    pub fn merge_candidates(&self, threshold: f64) -> Vec<Vec<IdentityId>> {
        let mut links = IdentityLinks::new(self.identities.iter().map(Identity::id));
        for (i, a) in self.identities.iter().enumerate() {
            for b in &self.identities[i + 1..] {
                if a.centroid().distance_to_centroid(b.centroid()) < threshold {
                    links.link(a.id(), b.id());
                }
            }
        }
        links.groups()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: SESSION_SNAPSHOT_VERSION,
            match_threshold: self.match_threshold,
            frame_size: self.frame_size,
            next_id: self.next_id,
            identities: self.identities.iter().map(Identity::snapshot).collect(),
        }
    }

    /// Rebuilds a session from a snapshot; centroids are recomputed.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, IdentityError> {
        if !(snapshot.match_threshold.is_finite() && snapshot.match_threshold > 0.0) {
            return Err(IdentityError::InvalidThreshold(snapshot.match_threshold));
        }
        let mut seen: HashSet<IdentityId> = HashSet::new();
        let mut identities = Vec::with_capacity(snapshot.identities.len());
        for identity_snapshot in snapshot.identities {
            if !seen.insert(identity_snapshot.id) {
                return Err(IdentityError::DuplicateIdentity(identity_snapshot.id));
            }
            identities.push(Identity::restore(identity_snapshot)?);
        }
        identities.sort_by_key(Identity::id);

        let dimension = identities.first().map(|i| i.centroid().dimension());
        if let Some(expected) = dimension {
            if let Some(bad) = identities
                .iter()
                .find(|i| i.centroid().dimension() != expected)
            {
                return Err(IdentityError::DimensionMismatch {
                    expected,
                    actual: bad.centroid().dimension(),
                });
            }
        }

        let last_timestamp = identities
            .iter()
            .filter_map(|i| i.detections().last().map(|d| d.timestamp))
            .max_by(f64::total_cmp);
        let next_id = identities
            .iter()
            .map(|i| i.id() + 1)
            .max()
            .unwrap_or(1)
            .max(snapshot.next_id);

        Ok(Self {
            match_threshold: snapshot.match_threshold,
            identities,
            next_id,
            dimension,
            last_timestamp,
            frame_size: snapshot.frame_size,
        })
    }
}
