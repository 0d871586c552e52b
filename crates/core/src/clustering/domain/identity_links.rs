use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::clustering::domain::identity::IdentityId;

/// Disjoint sets of identity ids, joined by pairwise links.
///
/// Every set is rooted at its lowest id, so [`IdentityLinks::groups`] comes
/// out ordered without a second sort.
pub struct IdentityLinks {
    ids: Vec<IdentityId>,
    position: HashMap<IdentityId, usize>,
    parent: Vec<usize>,
}

impl IdentityLinks {
    pub fn new(ids: impl IntoIterator<Item = IdentityId>) -> Self {
        let mut ids: Vec<IdentityId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let position = ids.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
        let parent = (0..ids.len()).collect();
        Self {
            ids,
            position,
            parent,
        }
    }

    /// Path-halving lookup of the set root.
    fn root(&mut self, mut pos: usize) -> usize {
        while self.parent[pos] != pos {
            self.parent[pos] = self.parent[self.parent[pos]];
            pos = self.parent[pos];
        }
        pos
    }

    /// Puts `a` and `b` in the same group. Ids not given to `new` are ignored.
    pub fn link(&mut self, a: IdentityId, b: IdentityId) {
        let (Some(&pa), Some(&pb)) = (self.position.get(&a), self.position.get(&b)) else {
            return;
        };
        let (ra, rb) = (self.root(pa), self.root(pb));
        // Positions follow id order, so the lower root keeps the lower id.
        match ra.cmp(&rb) {
            Ordering::Less => self.parent[rb] = ra,
            Ordering::Greater => self.parent[ra] = rb,
            Ordering::Equal => {}
        }
    }

    /// Groups of two or more ids, each ascending, ordered by lowest id.
    pub fn groups(mut self) -> Vec<Vec<IdentityId>> {
        let mut groups: BTreeMap<usize, Vec<IdentityId>> = BTreeMap::new();
        for pos in 0..self.ids.len() {
            let root = self.root(pos);
            groups.entry(root).or_default().push(self.ids[pos]);
        }
        groups.into_values().filter(|group| group.len() > 1).collect()
    }
}
