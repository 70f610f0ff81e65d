//! Scene ownership and per-frame orchestration
//!
//! The scene owns the node arena, the spatial index and the injected event
//! sink, and drives the ordered frame protocol:
//!
//! 1. [`Scene::refresh`]: single-pass top-down walk refreshing
//!    transforms, ticking bodies and updating index leaves. A body's
//!    broadphase sees this frame's collider for already-visited bodies and
//!    last frame's for the rest; that approximation is accepted, not
//!    iterated to a fixed point.
//! 2. External scripting happens between the passes, outside this crate.
//! 3. [`Scene::end_of_frame_refresh`]: final transform+index pass, then
//!    deferred removals, the collision-couple sweep, the awake-box drain,
//!    and the commit of deferred collision-mask edits, in that order.
//!
//! Structural index mutation only happens inside these passes, so solver
//! queries never observe a mutating structure.

use std::cmp::Ordering;
use std::sync::Arc;

use aabox::{Aabb, Face};
use glam::{IVec3, Mat4, Vec3};
use thiserror::Error;

use crate::body::{BodyMode, RigidBody, TickOutcome};
use crate::config::PhysicsConfig;
use crate::couple::Couple;
use crate::events::{CollisionEvents, NullEvents};
use crate::node::{ColliderSource, Node, NodeHandle};
use crate::shape::VoxelShape;
use crate::solver;
use crate::spatial::{CastCandidate, LeafHandle, LinearIndex, SpatialIndex};
use crate::transform::Transform;

/// Failures of hierarchy edits; everything else in the scene degrades to
/// no-ops rather than erroring
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    #[error("node handle is stale or destroyed")]
    DeadNode,
    #[error("attaching would create a hierarchy cycle")]
    Cycle,
}

/// What a cast struck
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitKind {
    /// The body's collision box
    Collider,
    /// A voxel block of a per-block body
    Voxel { cell: IVec3, face: Face },
}

/// Result of a ray or box cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastHit {
    pub node: NodeHandle,
    /// Ray casts: parameter in units of the ray direction. Box casts:
    /// world-space distance traveled before contact.
    pub distance: f32,
    pub point: Vec3,
    pub kind: HitKind,
}

pub(crate) struct Slot {
    pub generation: u32,
    pub node: Option<Node>,
}

/// Reusable query buffers owned by the scene, so the broadphase loop never
/// allocates per iteration
#[derive(Default)]
pub(crate) struct Scratch {
    pub overlaps: Vec<LeafHandle>,
    pub candidates: Vec<CastCandidate>,
}

/// Physics scene: node hierarchy, spatial index handle and frame driver
pub struct Scene {
    pub(crate) slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeHandle>,
    pub(crate) index: Box<dyn SpatialIndex>,
    pub(crate) events: Box<dyn CollisionEvents>,
    pub(crate) config: PhysicsConfig,
    pub(crate) gravity: Vec3,
    pending_removals: Vec<NodeHandle>,
    pub(crate) couples: Vec<Couple>,
    awake_boxes: Vec<Aabb>,
    pub(crate) scratch: Scratch,
}

/// Queue an awake box, merging into an overlapping pending box instead of
/// growing the queue
pub(crate) fn merge_awake_box(queue: &mut Vec<Aabb>, aabb: Aabb) {
    for pending in queue.iter_mut() {
        if pending.intersects(&aabb) {
            *pending = pending.union(&aabb);
            return;
        }
    }
    queue.push(aabb);
}

impl Scene {
    pub fn new(
        index: Box<dyn SpatialIndex>,
        events: Box<dyn CollisionEvents>,
        gravity: Vec3,
        config: PhysicsConfig,
    ) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            index,
            events,
            config,
            gravity,
            pending_removals: Vec::new(),
            couples: Vec::new(),
            awake_boxes: Vec::new(),
            scratch: Scratch::default(),
        }
    }

    /// Scene over the reference index with events discarded
    pub fn with_defaults(gravity: Vec3) -> Self {
        Self::new(
            Box::new(LinearIndex::new()),
            Box::new(NullEvents),
            gravity,
            PhysicsConfig::default(),
        )
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    // ------------------------------------------------------------------
    // Node arena and hierarchy
    // ------------------------------------------------------------------

    /// Create a node, attached under `parent` or at the root
    pub fn create_node(&mut self, parent: Option<NodeHandle>) -> Result<NodeHandle, SceneError> {
        if let Some(p) = parent {
            if self.node(p).is_none() {
                return Err(SceneError::DeadNode);
            }
        }
        let node = Node::new(parent);
        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.node.is_none(), "free-listed slot must be vacant");
            slot.node = Some(node);
            NodeHandle::from_raw(index, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeHandle::from_raw((self.slots.len() - 1) as u32, 0)
        };
        match parent {
            Some(p) => {
                if let Some(pn) = self.node_mut(p) {
                    pn.children.push(handle);
                }
            }
            None => self.roots.push(handle),
        }
        Ok(handle)
    }

    pub fn is_alive(&self, h: NodeHandle) -> bool {
        self.node(h).is_some()
    }

    pub(crate) fn node(&self, h: NodeHandle) -> Option<&Node> {
        let slot = self.slots.get(h.index as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub(crate) fn node_mut(&mut self, h: NodeHandle) -> Option<&mut Node> {
        let slot = self.slots.get_mut(h.index as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn transform(&self, h: NodeHandle) -> Option<&Transform> {
        self.node(h).map(|n| &n.transform)
    }

    pub fn transform_mut(&mut self, h: NodeHandle) -> Option<&mut Transform> {
        self.node_mut(h).map(|n| &mut n.transform)
    }

    pub fn body(&self, h: NodeHandle) -> Option<&RigidBody> {
        self.node(h).and_then(|n| n.body.as_ref())
    }

    pub fn body_mut(&mut self, h: NodeHandle) -> Option<&mut RigidBody> {
        self.node_mut(h).and_then(|n| n.body.as_mut())
    }

    /// Attach a body to a node, replacing (and unindexing) any previous one
    pub fn set_body(&mut self, h: NodeHandle, body: RigidBody) {
        self.clear_body(h);
        if let Some(node) = self.node_mut(h) {
            node.body = Some(body);
        }
    }

    /// Remove a node's body and its index leaf
    pub fn clear_body(&mut self, h: NodeHandle) {
        let leaf = match self.node_mut(h) {
            Some(node) => node.body.take().and_then(|b| b.leaf),
            None => return,
        };
        if let Some(leaf) = leaf {
            let pad = self.config.awake_box_padding;
            if let Some(aabb) = self.index.leaf_aabb(leaf) {
                merge_awake_box(&mut self.awake_boxes, aabb.padded(pad));
            }
            self.index.remove(leaf);
        }
    }

    pub fn set_collider_source(&mut self, h: NodeHandle, source: ColliderSource) {
        if let Some(node) = self.node_mut(h) {
            node.collider_source = source;
        }
    }

    /// Attach voxel occupancy for per-block collision modes
    pub fn set_shape(&mut self, h: NodeHandle, shape: Arc<dyn VoxelShape>) {
        if let Some(node) = self.node_mut(h) {
            node.shape = Some(shape);
        }
    }

    /// Update a body's group masks; the index-side edit is deferred until
    /// the end-of-frame commit
    pub fn set_collision_masks(&mut self, h: NodeHandle, groups: u32, collides_with: u32) {
        let leaf = match self.node_mut(h) {
            Some(node) => match &mut node.body {
                Some(body) => {
                    body.groups = groups;
                    body.collides_with = collides_with;
                    body.leaf
                }
                None => return,
            },
            None => return,
        };
        if let Some(leaf) = leaf {
            self.index.set_masks(leaf, groups, collides_with);
        }
    }

    /// Re-parent a node; `None` makes it a root. Cancels a pending removal.
    pub fn attach(&mut self, h: NodeHandle, parent: Option<NodeHandle>) -> Result<(), SceneError> {
        if self.node(h).is_none() {
            return Err(SceneError::DeadNode);
        }
        if let Some(p) = parent {
            if self.node(p).is_none() {
                return Err(SceneError::DeadNode);
            }
            // Walking the ancestor chain of the new parent must not reach h
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == h {
                    return Err(SceneError::Cycle);
                }
                cursor = self.node(c).and_then(|n| n.parent);
            }
        }
        self.unlink(h);
        match parent {
            Some(p) => {
                if let Some(pn) = self.node_mut(p) {
                    pn.children.push(h);
                }
            }
            None => self.roots.push(h),
        }
        if let Some(node) = self.node_mut(h) {
            node.parent = parent;
            node.linked = true;
        }
        Ok(())
    }

    /// Detach a node from the hierarchy and queue it for removal
    ///
    /// The node (and subtree) is only destroyed at the end-of-frame pass,
    /// and only if it is still detached then: re-attaching within the same
    /// frame cancels the removal.
    pub fn detach(&mut self, h: NodeHandle) {
        let linked = match self.node(h) {
            Some(node) => node.linked,
            None => return,
        };
        if !linked {
            return;
        }
        self.unlink(h);
        if let Some(node) = self.node_mut(h) {
            node.linked = false;
        }
        self.pending_removals.push(h);
        tracing::debug!(?h, "node detached, removal deferred");
    }

    fn unlink(&mut self, h: NodeHandle) {
        let parent = self.node(h).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(pn) = self.node_mut(p) {
                    pn.children.retain(|c| *c != h);
                }
            }
            None => self.roots.retain(|c| *c != h),
        }
        if let Some(node) = self.node_mut(h) {
            node.parent = None;
        }
    }

    // ------------------------------------------------------------------
    // Frame protocol
    // ------------------------------------------------------------------

    /// First frame pass: refresh transforms, tick bodies, update leaves
    pub fn refresh(&mut self, dt: f32) {
        let mut i = 0;
        loop {
            let Some(root) = self.roots.get(i).copied() else {
                break;
            };
            self.refresh_node(root, Mat4::IDENTITY, false, Some(dt));
            i += 1;
        }
    }

    /// Final frame pass: transforms and leaves, then deferred bookkeeping
    pub fn end_of_frame_refresh(&mut self) {
        let mut i = 0;
        loop {
            let Some(root) = self.roots.get(i).copied() else {
                break;
            };
            self.refresh_node(root, Mat4::IDENTITY, false, None);
            i += 1;
        }
        self.resolve_removals();
        self.sweep_couples();
        self.drain_awake_boxes();
        self.index.commit_mask_edits();
    }

    fn refresh_node(
        &mut self,
        h: NodeHandle,
        parent_world: Mat4,
        parent_changed: bool,
        tick_dt: Option<f32>,
    ) {
        let changed = {
            let Some(node) = self.node_mut(h) else { return };
            node.transform.refresh(&parent_world, parent_changed)
        };
        let mut subtree_changed = changed;

        if let Some(dt) = tick_dt {
            let has_body = self.node(h).map(|n| n.body.is_some()).unwrap_or(false);
            if has_body {
                let outcome = solver::tick_body(self, h, dt);
                if outcome == TickOutcome::Moved {
                    // The tick moved the node; bring the matrices back in
                    // sync before the leaf update sees them.
                    if let Some(node) = self.node_mut(h) {
                        node.transform.refresh(&parent_world, false);
                    }
                    subtree_changed = true;
                }
            }
        }

        self.update_leaf(h);

        let mut i = 0;
        loop {
            let (child, world) = {
                let Some(node) = self.node(h) else { return };
                match node.children.get(i) {
                    Some(c) => (*c, node.transform.world_matrix()),
                    None => break,
                }
            };
            self.refresh_node(child, world, subtree_changed, tick_dt);
            i += 1;
        }
    }

    /// Insert, move or remove a node's index leaf per its eligibility
    fn update_leaf(&mut self, h: NodeHandle) {
        let pad = self.config.awake_box_padding;
        let Some((world, leaf, eligible, groups, collides_with)) = ({
            self.node(h).and_then(|node| {
                node.body.as_ref().map(|body| {
                    let world = node.world_collider();
                    let eligible = body.is_indexable(&world) && node.linked;
                    (world, body.leaf, eligible, body.groups, body.collides_with)
                })
            })
        }) else {
            return;
        };

        match (leaf, eligible) {
            (None, true) => {
                let leaf = self.index.insert(world, groups, collides_with, h);
                if let Some(body) = self.body_mut(h) {
                    body.leaf = Some(leaf);
                }
                merge_awake_box(&mut self.awake_boxes, world.padded(pad));
                tracing::debug!(?h, "body indexed");
            }
            (Some(l), false) => {
                if let Some(aabb) = self.index.leaf_aabb(l) {
                    merge_awake_box(&mut self.awake_boxes, aabb.padded(pad));
                }
                self.index.remove(l);
                if let Some(body) = self.body_mut(h) {
                    body.leaf = None;
                }
                tracing::debug!(?h, "body unindexed");
            }
            (Some(l), true) => {
                let old = self.index.leaf_aabb(l);
                if old != Some(world) {
                    self.index.update(l, world);
                    let merged = old.map(|o| o.union(&world)).unwrap_or(world);
                    merge_awake_box(&mut self.awake_boxes, merged.padded(pad));
                }
            }
            (None, false) => {}
        }

        if let Some(node) = self.node_mut(h) {
            node.transform.clear_physics_dirty();
        }
    }

    // ------------------------------------------------------------------
    // Deferred bookkeeping
    // ------------------------------------------------------------------

    fn resolve_removals(&mut self) {
        let pending = std::mem::take(&mut self.pending_removals);
        for h in pending {
            let still_detached = self.node(h).map(|n| !n.linked).unwrap_or(false);
            if still_detached {
                self.free_subtree(h);
            }
        }
    }

    fn free_subtree(&mut self, h: NodeHandle) {
        let children = match self.node(h) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.free_subtree(child);
        }

        let leaf = self
            .node_mut(h)
            .and_then(|n| n.body.as_mut())
            .and_then(|b| b.leaf.take());
        if let Some(leaf) = leaf {
            let pad = self.config.awake_box_padding;
            if let Some(aabb) = self.index.leaf_aabb(leaf) {
                merge_awake_box(&mut self.awake_boxes, aabb.padded(pad));
            }
            self.index.remove(leaf);
        }

        let slot = &mut self.slots[h.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(h.index);
        tracing::debug!(?h, "node destroyed");
    }

    /// Drop couples whose contact demonstrably ended, firing the
    /// end-of-contact event exactly once per dropped couple
    fn sweep_couples(&mut self) {
        let stale_limit = self.config.couple_stale_frames;
        let mut i = 0;
        while i < self.couples.len() {
            let c = self.couples[i];
            let (drop, notify) = {
                let a = self.node(c.a).and_then(|n| n.body.as_ref());
                let b = self.node(c.b).and_then(|n| n.body.as_ref());
                match (a, b) {
                    (Some(a), Some(b)) => {
                        let notify = a.end_events_enabled || b.end_events_enabled;
                        if !a.is_dynamic_or_active_trigger() && !b.is_dynamic_or_active_trigger()
                        {
                            (true, notify)
                        } else if c.frames_waiting > stale_limit {
                            (true, notify)
                        } else if !a.contacts.contains(c.face) {
                            (true, notify)
                        } else {
                            (false, false)
                        }
                    }
                    (a, b) => {
                        // One side vanished; notify whoever is left
                        let notify = a.map(|x| x.end_events_enabled).unwrap_or(false)
                            || b.map(|x| x.end_events_enabled).unwrap_or(false);
                        (true, notify)
                    }
                }
            };
            if drop {
                self.couples.swap_remove(i);
                if notify {
                    self.events.on_contact_end(c.a, c.b, c.face);
                }
                tracing::trace!(a = ?c.a, b = ?c.b, face = ?c.face, "collision couple ends");
            } else {
                self.couples[i].frames_waiting += 1;
                i += 1;
            }
        }
    }

    /// Register a region whose nearby bodies must resume simulation at the
    /// next end-of-frame pass
    pub fn register_awake_box(&mut self, aabb: Aabb) {
        merge_awake_box(&mut self.awake_boxes, aabb);
    }

    fn drain_awake_boxes(&mut self) {
        let boxes = std::mem::take(&mut self.awake_boxes);
        let frames = self.config.awake_frames;
        for aabb in boxes {
            let mut found = std::mem::take(&mut self.scratch.overlaps);
            debug_assert!(found.is_empty(), "broadphase scratch must be drained before reuse");
            self.index.query_overlaps(&aabb, u32::MAX, u32::MAX, 0.0, &mut found);
            for i in 0..found.len() {
                let Some(h) = self.index.leaf_payload(found[i]) else {
                    continue;
                };
                if let Some(body) = self.body_mut(h) {
                    body.wake(frames);
                }
            }
            found.clear();
            self.scratch.overlaps = found;
        }
    }

    // ------------------------------------------------------------------
    // Casting
    // ------------------------------------------------------------------

    /// Cast a ray and return the first confirmed hit
    ///
    /// Candidates arrive sorted by broadphase distance; dynamic bodies
    /// accept that distance outright while non-dynamic bodies are re-tested
    /// in their local space, per-block bodies down to the voxel.
    pub fn cast_ray(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        max_t: f32,
        groups: u32,
        collides_with: u32,
    ) -> Option<CastHit> {
        let mut candidates = std::mem::take(&mut self.scratch.candidates);
        debug_assert!(candidates.is_empty(), "cast scratch must be drained before reuse");
        self.index
            .cast_ray(origin, dir, max_t, groups, collides_with, &mut candidates);
        candidates.sort_by(|x, y| x.distance.partial_cmp(&y.distance).unwrap_or(Ordering::Equal));

        let mut hit = None;
        for cand in candidates.iter() {
            if let Some(found) = self.confirm_ray_hit(*cand, origin, dir, max_t) {
                hit = Some(found);
                break;
            }
        }
        candidates.clear();
        self.scratch.candidates = candidates;
        hit
    }

    fn confirm_ray_hit(
        &self,
        cand: CastCandidate,
        origin: Vec3,
        dir: Vec3,
        max_t: f32,
    ) -> Option<CastHit> {
        let h = self.index.leaf_payload(cand.leaf)?;
        let node = self.node(h)?;
        let body = node.body.as_ref()?;
        match body.mode() {
            BodyMode::Disabled => None,
            BodyMode::Dynamic => Some(CastHit {
                node: h,
                distance: cand.distance,
                point: origin + dir * cand.distance,
                kind: HitKind::Collider,
            }),
            mode => {
                let inv = node.transform.world_inverse();
                let local_origin = inv.transform_point3(origin);
                let local_dir = inv.transform_vector3(dir);
                if mode.is_per_block() {
                    let shape = node.shape.as_ref()?;
                    let voxel = shape.cast_ray(local_origin, local_dir, max_t)?;
                    Some(CastHit {
                        node: h,
                        distance: voxel.t,
                        point: origin + dir * voxel.t,
                        kind: HitKind::Voxel {
                            cell: voxel.cell,
                            face: voxel.face,
                        },
                    })
                } else {
                    let t = body.collider.clip_ray(local_origin, local_dir)?;
                    (t <= max_t).then_some(CastHit {
                        node: h,
                        distance: t,
                        point: origin + dir * t,
                        kind: HitKind::Collider,
                    })
                }
            }
        }
    }

    /// Sweep a box along `dv` and return the first confirmed hit
    pub fn cast_box(
        &mut self,
        aabb: &Aabb,
        dv: Vec3,
        groups: u32,
        collides_with: u32,
    ) -> Option<CastHit> {
        let mut candidates = std::mem::take(&mut self.scratch.candidates);
        debug_assert!(candidates.is_empty(), "cast scratch must be drained before reuse");
        self.index
            .cast_box(aabb, dv, groups, collides_with, &mut candidates);
        candidates.sort_by(|x, y| x.distance.partial_cmp(&y.distance).unwrap_or(Ordering::Equal));

        let mut hit = None;
        for cand in candidates.iter() {
            if let Some(found) = self.confirm_box_hit(*cand, aabb, dv) {
                hit = Some(found);
                break;
            }
        }
        candidates.clear();
        self.scratch.candidates = candidates;
        hit
    }

    /// Number of live nodes (diagnostics and tests)
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    fn confirm_box_hit(&self, cand: CastCandidate, aabb: &Aabb, dv: Vec3) -> Option<CastHit> {
        let h = self.index.leaf_payload(cand.leaf)?;
        let node = self.node(h)?;
        let body = node.body.as_ref()?;
        match body.mode() {
            BodyMode::Disabled => None,
            BodyMode::Dynamic => Some(CastHit {
                node: h,
                distance: cand.distance * dv.length(),
                point: aabb.center() + dv * cand.distance,
                kind: HitKind::Collider,
            }),
            mode => {
                let inv = node.transform.world_inverse();
                let moving_local = aabb.transformed(&inv);
                let dv_local = inv.transform_vector3(dv);
                if mode.is_per_block() {
                    let shape = node.shape.as_ref()?;
                    let voxel = shape.sweep_box(&moving_local, dv_local, Vec3::ZERO, false);
                    let face = voxel.sweep.face?;
                    Some(CastHit {
                        node: h,
                        distance: voxel.sweep.ratio * dv.length(),
                        point: aabb.center() + dv * voxel.sweep.ratio,
                        kind: match voxel.cell {
                            Some(cell) => HitKind::Voxel { cell, face },
                            None => HitKind::Collider,
                        },
                    })
                } else {
                    if moving_local.intersects(&body.collider) {
                        return Some(CastHit {
                            node: h,
                            distance: 0.0,
                            point: aabb.center(),
                            kind: HitKind::Collider,
                        });
                    }
                    let sweep =
                        aabox::sweep_box(&moving_local, dv_local, &body.collider, Vec3::ZERO, false);
                    sweep.face?;
                    Some(CastHit {
                        node: h,
                        distance: sweep.ratio * dv.length(),
                        point: aabb.center() + dv * sweep.ratio,
                        kind: HitKind::Collider,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scene() -> Scene {
        Scene::with_defaults(Vec3::new(0.0, -9.8, 0.0))
    }

    fn boxed_body(scene: &mut Scene, mode: BodyMode) -> NodeHandle {
        let h = scene.create_node(None).unwrap();
        scene.set_body(
            h,
            RigidBody::new(mode, Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.5))),
        );
        h
    }

    #[test]
    fn test_create_node_under_dead_parent_fails() {
        let mut scene = test_scene();
        let parent = scene.create_node(None).unwrap();
        scene.detach(parent);
        scene.end_of_frame_refresh();

        assert!(!scene.is_alive(parent));
        assert_eq!(scene.create_node(Some(parent)), Err(SceneError::DeadNode));
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut scene = test_scene();
        let a = scene.create_node(None).unwrap();
        let b = scene.create_node(Some(a)).unwrap();
        let c = scene.create_node(Some(b)).unwrap();

        assert_eq!(scene.attach(a, Some(c)), Err(SceneError::Cycle));
        assert_eq!(scene.attach(a, Some(a)), Err(SceneError::Cycle));
        // Re-parenting a leaf is fine
        assert!(scene.attach(c, Some(a)).is_ok());
    }

    #[test]
    fn test_detach_destroys_subtree_at_end_of_frame() {
        let mut scene = test_scene();
        let parent = boxed_body(&mut scene, BodyMode::Static);
        let child = scene.create_node(Some(parent)).unwrap();
        scene.refresh(1.0 / 60.0);

        scene.detach(parent);
        // Still alive until the end-of-frame pass resolves the queue
        assert!(scene.is_alive(parent));

        scene.end_of_frame_refresh();
        assert!(!scene.is_alive(parent));
        assert!(!scene.is_alive(child));
        assert_eq!(scene.node_count(), 0);
        assert!(scene.transform(parent).is_none());
    }

    #[test]
    fn test_reattach_within_frame_cancels_removal() {
        let mut scene = test_scene();
        let h = boxed_body(&mut scene, BodyMode::Static);
        scene.refresh(1.0 / 60.0);

        scene.detach(h);
        scene.attach(h, None).unwrap();
        scene.end_of_frame_refresh();

        assert!(scene.is_alive(h));
        assert!(scene.body(h).is_some());
    }

    #[test]
    fn test_freed_slot_reuse_invalidates_old_handle() {
        let mut scene = test_scene();
        let old = scene.create_node(None).unwrap();
        scene.detach(old);
        scene.end_of_frame_refresh();

        let new = scene.create_node(None).unwrap();
        assert!(!scene.is_alive(old));
        assert!(scene.is_alive(new));
        assert!(scene.transform(old).is_none());
    }

    #[test]
    fn test_child_transform_follows_parent() {
        let mut scene = test_scene();
        let parent = scene.create_node(None).unwrap();
        let child = scene.create_node(Some(parent)).unwrap();
        scene.transform_mut(parent).unwrap().set_position(Vec3::new(5.0, 0.0, 0.0));
        scene.transform_mut(child).unwrap().set_position(Vec3::new(1.0, 2.0, 0.0));

        scene.refresh(1.0 / 60.0);

        let world = scene.transform(child).unwrap().world_matrix();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(6.0, 2.0, 0.0));
    }

    #[test]
    fn test_merge_awake_box_unions_overlapping() {
        let mut queue = Vec::new();
        merge_awake_box(&mut queue, Aabb::new(Vec3::ZERO, Vec3::ONE));
        merge_awake_box(&mut queue, Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].min, Vec3::ZERO);
        assert_eq!(queue[0].max, Vec3::splat(2.0));

        // Disjoint boxes queue separately
        merge_awake_box(&mut queue, Aabb::new(Vec3::splat(10.0), Vec3::splat(11.0)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_disabled_body_is_never_indexed() {
        let mut scene = test_scene();
        let h = boxed_body(&mut scene, BodyMode::Disabled);
        scene.refresh(1.0 / 60.0);
        scene.end_of_frame_refresh();

        let hit = scene.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 100.0, u32::MAX, u32::MAX);
        assert!(hit.is_none());

        // Enabling the body makes it visible at the next refresh
        scene.body_mut(h).unwrap().set_mode(BodyMode::Static);
        scene.refresh(1.0 / 60.0);
        let hit = scene.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 100.0, u32::MAX, u32::MAX);
        assert_eq!(hit.map(|c| c.node), Some(h));
    }

    #[test]
    fn test_mask_edit_is_deferred_to_end_of_frame() {
        let mut scene = test_scene();
        let h = boxed_body(&mut scene, BodyMode::Static);
        scene.refresh(1.0 / 60.0);

        // Move the body to group 2 only; the leaf keeps the old masks
        // until the commit
        scene.set_collision_masks(h, 2, 2);
        let hit = scene.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 100.0, 0, 1);
        assert!(hit.is_some());

        scene.end_of_frame_refresh();
        let hit = scene.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 100.0, 0, 1);
        assert!(hit.is_none());
        let hit = scene.cast_ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 100.0, 0, 2);
        assert!(hit.is_some());
    }
}
