//! Spatial index interface and reference implementation
//!
//! The scene consumes the index through the [`SpatialIndex`] trait only:
//! insert/remove/update leaves, overlap queries, distance-sortable cast
//! queries, and deferred collision-mask edits. The internal acceleration
//! structure is deliberately not part of the contract.
//!
//! Structural mutation is confined to well-defined frame points (post-tick
//! leaf updates, end-of-frame commits), so queries never observe a mutating
//! structure mid-solve.
//!
//! [`LinearIndex`] is the reference implementation: generational slots over
//! a flat vector with linear-scan queries. It is intentionally trivial and
//! adequate for moderate scene sizes; a broadphase tree can replace it
//! behind the same trait.

use crate::node::NodeHandle;
use aabox::{sweep_box, Aabb};
use glam::Vec3;

/// Generation-counted handle to an index leaf
///
/// A stale handle (outliving its leaf) is detected and rejected by every
/// accessor rather than aliasing a recycled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// A cast-query candidate with its broadphase distance
#[derive(Debug, Clone, Copy)]
pub struct CastCandidate {
    pub leaf: LeafHandle,
    pub distance: f32,
}

/// Broadphase index over body AABBs
///
/// Group semantics: a query with masks `(groups, collides_with)` matches a
/// leaf when either side's `collides_with` intersects the other side's
/// `groups`. The relation is intentionally not symmetric in its inputs;
/// reciprocity comes from testing both directions.
pub trait SpatialIndex {
    /// Insert a leaf; the payload identifies the owning scene node
    fn insert(&mut self, aabb: Aabb, groups: u32, collides_with: u32, payload: NodeHandle)
        -> LeafHandle;

    /// Remove a leaf. Stale handles are ignored.
    fn remove(&mut self, leaf: LeafHandle);

    /// Move a leaf to a new AABB
    fn update(&mut self, leaf: LeafHandle, aabb: Aabb);

    fn leaf_aabb(&self, leaf: LeafHandle) -> Option<Aabb>;
    fn leaf_payload(&self, leaf: LeafHandle) -> Option<NodeHandle>;

    /// Collect leaves whose AABB overlaps `aabb` (loosened by `eps`) and
    /// whose masks match reciprocally. Results are appended to `out`,
    /// which the caller owns and reuses across queries.
    fn query_overlaps(
        &self,
        aabb: &Aabb,
        groups: u32,
        collides_with: u32,
        eps: f32,
        out: &mut Vec<LeafHandle>,
    );

    /// Collect candidate leaves along a ray with broadphase entry
    /// distances, in units of `dir`
    fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_t: f32,
        groups: u32,
        collides_with: u32,
        out: &mut Vec<CastCandidate>,
    );

    /// Collect candidate leaves along a swept box with broadphase contact
    /// distances as fractions of `dv`
    fn cast_box(
        &self,
        aabb: &Aabb,
        dv: Vec3,
        groups: u32,
        collides_with: u32,
        out: &mut Vec<CastCandidate>,
    );

    /// Stage a collision-mask edit; visible to queries only after
    /// [`commit_mask_edits`](SpatialIndex::commit_mask_edits)
    fn set_masks(&mut self, leaf: LeafHandle, groups: u32, collides_with: u32);

    /// Apply all staged mask edits
    fn commit_mask_edits(&mut self);
}

fn masks_match(q_groups: u32, q_collides: u32, l_groups: u32, l_collides: u32) -> bool {
    q_collides & l_groups != 0 || l_collides & q_groups != 0
}

struct Leaf {
    aabb: Aabb,
    groups: u32,
    collides_with: u32,
    payload: NodeHandle,
}

struct Slot {
    generation: u32,
    leaf: Option<Leaf>,
}

/// Flat-vector reference implementation of [`SpatialIndex`]
#[derive(Default)]
pub struct LinearIndex {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pending_masks: Vec<(LeafHandle, u32, u32)>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live leaves
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.leaf.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, handle: LeafHandle) -> Option<&Leaf> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.leaf.as_ref()
    }

    fn get_mut(&mut self, handle: LeafHandle) -> Option<&mut Leaf> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.leaf.as_mut()
    }

    fn live(&self) -> impl Iterator<Item = (LeafHandle, &Leaf)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.leaf.as_ref().map(|leaf| {
                (
                    LeafHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    leaf,
                )
            })
        })
    }
}

impl SpatialIndex for LinearIndex {
    fn insert(
        &mut self,
        aabb: Aabb,
        groups: u32,
        collides_with: u32,
        payload: NodeHandle,
    ) -> LeafHandle {
        let leaf = Leaf {
            aabb,
            groups,
            collides_with,
            payload,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.leaf.is_none(), "free-listed slot must be vacant");
            slot.leaf = Some(leaf);
            LeafHandle {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                leaf: Some(leaf),
            });
            LeafHandle {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn remove(&mut self, leaf: LeafHandle) {
        let Some(slot) = self.slots.get_mut(leaf.index as usize) else {
            return;
        };
        if slot.generation != leaf.generation || slot.leaf.is_none() {
            return;
        }
        slot.leaf = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(leaf.index);
    }

    fn update(&mut self, leaf: LeafHandle, aabb: Aabb) {
        if let Some(entry) = self.get_mut(leaf) {
            entry.aabb = aabb;
        }
    }

    fn leaf_aabb(&self, leaf: LeafHandle) -> Option<Aabb> {
        self.get(leaf).map(|l| l.aabb)
    }

    fn leaf_payload(&self, leaf: LeafHandle) -> Option<NodeHandle> {
        self.get(leaf).map(|l| l.payload)
    }

    fn query_overlaps(
        &self,
        aabb: &Aabb,
        groups: u32,
        collides_with: u32,
        eps: f32,
        out: &mut Vec<LeafHandle>,
    ) {
        for (handle, leaf) in self.live() {
            if !masks_match(groups, collides_with, leaf.groups, leaf.collides_with) {
                continue;
            }
            if aabb.intersects_eps(&leaf.aabb, eps) {
                out.push(handle);
            }
        }
    }

    fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_t: f32,
        groups: u32,
        collides_with: u32,
        out: &mut Vec<CastCandidate>,
    ) {
        for (handle, leaf) in self.live() {
            if !masks_match(groups, collides_with, leaf.groups, leaf.collides_with) {
                continue;
            }
            if let Some(t) = leaf.aabb.clip_ray(origin, dir) {
                if t <= max_t {
                    out.push(CastCandidate {
                        leaf: handle,
                        distance: t,
                    });
                }
            }
        }
    }

    fn cast_box(
        &self,
        aabb: &Aabb,
        dv: Vec3,
        groups: u32,
        collides_with: u32,
        out: &mut Vec<CastCandidate>,
    ) {
        for (handle, leaf) in self.live() {
            if !masks_match(groups, collides_with, leaf.groups, leaf.collides_with) {
                continue;
            }
            if aabb.intersects(&leaf.aabb) {
                out.push(CastCandidate {
                    leaf: handle,
                    distance: 0.0,
                });
                continue;
            }
            let sweep = sweep_box(aabb, dv, &leaf.aabb, Vec3::ZERO, false);
            if sweep.is_hit() {
                out.push(CastCandidate {
                    leaf: handle,
                    distance: sweep.ratio,
                });
            }
        }
    }

    fn set_masks(&mut self, leaf: LeafHandle, groups: u32, collides_with: u32) {
        self.pending_masks.push((leaf, groups, collides_with));
    }

    fn commit_mask_edits(&mut self) {
        while let Some((leaf, groups, collides_with)) = self.pending_masks.pop() {
            if let Some(entry) = self.get_mut(leaf) {
                entry.groups = groups;
                entry.collides_with = collides_with;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeHandle;

    fn payload(n: u32) -> NodeHandle {
        NodeHandle::from_raw(n, 0)
    }

    fn unit_at(x: f32) -> Aabb {
        Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_insert_query_remove_round_trip() {
        let mut index = LinearIndex::new();
        let mut out = Vec::new();

        index.query_overlaps(&unit_at(0.0), 1, 1, 0.0, &mut out);
        let baseline = out.len();

        let leaf = index.insert(unit_at(0.0), 1, 1, payload(0));
        out.clear();
        index.query_overlaps(&unit_at(0.5), 1, 1, 0.0, &mut out);
        assert_eq!(out.len(), 1);

        index.remove(leaf);
        out.clear();
        index.query_overlaps(&unit_at(0.5), 1, 1, 0.0, &mut out);
        assert_eq!(out.len(), baseline);
        assert!(index.is_empty());
    }

    #[test]
    fn test_stale_handle_rejected_after_reuse() {
        let mut index = LinearIndex::new();
        let old = index.insert(unit_at(0.0), 1, 1, payload(0));
        index.remove(old);

        // Slot is recycled with a bumped generation
        let new = index.insert(unit_at(5.0), 1, 1, payload(1));
        assert_eq!(old.index, new.index);
        assert_ne!(old.generation, new.generation);

        assert!(index.leaf_aabb(old).is_none());
        assert!(index.leaf_aabb(new).is_some());

        // Removing through the stale handle must not touch the new leaf
        index.remove(old);
        assert!(index.leaf_aabb(new).is_some());
    }

    #[test]
    fn test_reciprocal_mask_matching() {
        let mut index = LinearIndex::new();
        // Leaf collides with group 2, belongs to group 4
        index.insert(unit_at(0.0), 4, 2, payload(0));
        let mut out = Vec::new();

        // Query in group 2 that collides with nothing still matches:
        // the leaf's collides_with covers the query's groups
        index.query_overlaps(&unit_at(0.5), 2, 0, 0.0, &mut out);
        assert_eq!(out.len(), 1);

        // Query colliding with group 4 matches the other direction
        out.clear();
        index.query_overlaps(&unit_at(0.5), 0, 4, 0.0, &mut out);
        assert_eq!(out.len(), 1);

        // No intersection either way
        out.clear();
        index.query_overlaps(&unit_at(0.5), 8, 8, 0.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_mask_edits_deferred_until_commit() {
        let mut index = LinearIndex::new();
        let leaf = index.insert(unit_at(0.0), 1, 1, payload(0));
        let mut out = Vec::new();

        index.set_masks(leaf, 8, 8);

        // Still visible under the old masks before the commit
        index.query_overlaps(&unit_at(0.5), 1, 1, 0.0, &mut out);
        assert_eq!(out.len(), 1);

        index.commit_mask_edits();
        out.clear();
        index.query_overlaps(&unit_at(0.5), 1, 1, 0.0, &mut out);
        assert!(out.is_empty());
        out.clear();
        index.query_overlaps(&unit_at(0.5), 8, 8, 0.0, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_cast_ray_reports_entry_distance() {
        let mut index = LinearIndex::new();
        index.insert(unit_at(2.0), 1, 1, payload(0));
        index.insert(unit_at(5.0), 1, 1, payload(1));

        let mut out = Vec::new();
        index.cast_ray(Vec3::new(0.0, 0.5, 0.5), Vec3::X, 100.0, 1, 1, &mut out);
        assert_eq!(out.len(), 2);

        let mut distances: Vec<f32> = out.iter().map(|c| c.distance).collect();
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((distances[0] - 2.0).abs() < 1e-6);
        assert!((distances[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cast_box_overlap_starts_at_zero() {
        let mut index = LinearIndex::new();
        index.insert(unit_at(0.5), 1, 1, payload(0));

        let mut out = Vec::new();
        index.cast_box(&unit_at(0.0), Vec3::X, 1, 1, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].distance, 0.0);
    }
}
