//! User-triggered merging of identities.
//!
//! A merge is validate-then-act: every id is resolved and checked before
//! the first detection moves, so a failed merge leaves the session exactly
//! as it was. Recomputed state is a pure function of the combined detection
//! set, which makes the result independent of source ordering.

use std::collections::HashSet;

use crate::clustering::domain::clustering_session::ClusteringSession;
use crate::clustering::domain::identity::{Identity, IdentityId};
use crate::clustering::domain::identity_error::IdentityError;

impl ClusteringSession {
    /// Folds `sources` into `target`.
    ///
    /// The target keeps its id and label, gains every source detection,
    /// gets a fully recomputed centroid, and records each source's
    /// `{id, label}` in its provenance. Source ids become permanently
    /// unresolvable.
    pub fn merge(
        &mut self,
        target: IdentityId,
        sources: &[IdentityId],
    ) -> Result<&Identity, IdentityError> {
        self.validate_merge(target, sources)?;

        let source_set: HashSet<IdentityId> = sources.iter().copied().collect();
        let (mut absorbed, kept): (Vec<Identity>, Vec<Identity>) =
            std::mem::take(&mut self.identities)
                .into_iter()
                .partition(|identity| source_set.contains(&identity.id()));
        self.identities = kept;

        // Provenance follows the order the caller listed the sources in.
        absorbed.sort_by_key(|identity| {
            sources
                .iter()
                .position(|&id| id == identity.id())
                .unwrap_or(usize::MAX)
        });

        let before = self.detection_count()
            + absorbed
                .iter()
                .map(Identity::detection_count)
                .sum::<usize>();
        let target_idx = self.index_of(target)?;
        let merged = &mut self.identities[target_idx];
        for source in absorbed {
            merged.absorb(source);
        }
        merged.recompute();
        debug_assert_eq!(before, self.detection_count());

        let merged = &self.identities[target_idx];
        log::info!(
            "Merged {} identities into {} ({} detections)",
            sources.len(),
            merged.label(),
            merged.detection_count()
        );
        Ok(merged)
    }

    fn validate_merge(
        &self,
        target: IdentityId,
        sources: &[IdentityId],
    ) -> Result<(), IdentityError> {
        if self.identity(target).is_none() {
            return Err(IdentityError::UnknownIdentity(target));
        }
        if sources.is_empty() {
            return Err(IdentityError::NoMergeSources);
        }
        let mut seen: HashSet<IdentityId> = HashSet::with_capacity(sources.len());
        for &id in sources {
            if id == target {
                return Err(IdentityError::SelfMerge(id));
            }
            if !seen.insert(id) {
                return Err(IdentityError::DuplicateMergeSource(id));
            }
            if self.identity(id).is_none() {
                return Err(IdentityError::UnknownIdentity(id));
            }
        }
        Ok(())
    }

    fn index_of(&self, id: IdentityId) -> Result<usize, IdentityError> {
        self.identities
            .iter()
            .position(|identity| identity.id() == id)
            .ok_or(IdentityError::UnknownIdentity(id))
    }
}
