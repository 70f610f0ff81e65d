//! Per-node transform state
//!
//! The narrow transform interface the solver consumes: position, rotation
//! and scale with cached local/world/inverse matrices and dirty flags. The
//! hierarchy-dirty flag tracks pending matrix recomputation; the
//! physics-dirty flag tracks movement the spatial index has not seen yet.
//! This is deliberately not a general scene graph: matrix composition
//! happens during the scene's top-down refresh walk and nowhere else.

use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    local: Mat4,
    world: Mat4,
    world_inverse: Mat4,
    local_dirty: bool,
    hierarchy_dirty: bool,
    physics_dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            world_inverse: Mat4::IDENTITY,
            local_dirty: false,
            hierarchy_dirty: true,
            physics_dirty: true,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_dirty();
    }

    /// Shift the position by a delta (solver corrections, pushes)
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.mark_dirty();
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.mark_dirty();
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.mark_dirty();
    }

    /// Local matrix (recomputed lazily during refresh)
    pub fn local_matrix(&self) -> Mat4 {
        self.local
    }

    /// World matrix as of the last refresh
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    /// Inverse world matrix as of the last refresh
    pub fn world_inverse(&self) -> Mat4 {
        self.world_inverse
    }

    pub fn is_hierarchy_dirty(&self) -> bool {
        self.hierarchy_dirty
    }

    pub fn is_physics_dirty(&self) -> bool {
        self.physics_dirty
    }

    pub(crate) fn clear_physics_dirty(&mut self) {
        self.physics_dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.local_dirty = true;
        self.hierarchy_dirty = true;
        self.physics_dirty = true;
    }

    /// Recompute cached matrices under a parent world matrix
    ///
    /// Returns true when the world matrix changed, so the caller can
    /// propagate the recomputation down the subtree.
    pub(crate) fn refresh(&mut self, parent_world: &Mat4, parent_changed: bool) -> bool {
        if self.local_dirty {
            self.local =
                Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position);
            self.local_dirty = false;
        }
        if self.hierarchy_dirty || parent_changed {
            self.world = *parent_world * self.local;
            self.world_inverse = self.world.inverse();
            self.hierarchy_dirty = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_composes_parent() {
        let mut parent = Transform::new();
        parent.set_position(Vec3::new(10.0, 0.0, 0.0));
        parent.refresh(&Mat4::IDENTITY, false);

        let mut child = Transform::new();
        child.set_position(Vec3::new(0.0, 5.0, 0.0));
        child.refresh(&parent.world_matrix(), false);

        let p = child.world_matrix().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn test_refresh_clean_is_stable() {
        let mut t = Transform::new();
        t.set_position(Vec3::ONE);
        assert!(t.refresh(&Mat4::IDENTITY, false));
        // Second refresh with an unchanged parent does nothing
        assert!(!t.refresh(&Mat4::IDENTITY, false));
        // A changed parent forces recomputation even when locally clean
        assert!(t.refresh(&Mat4::from_translation(Vec3::X), true));
        let p = t.world_matrix().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn test_world_inverse_round_trips() {
        let mut t = Transform::new();
        t.set_position(Vec3::new(3.0, -2.0, 1.0));
        t.set_rotation(Quat::from_rotation_y(0.7));
        t.refresh(&Mat4::IDENTITY, false);

        let p = Vec3::new(1.0, 2.0, 3.0);
        let back = t.world_inverse().transform_point3(t.world_matrix().transform_point3(p));
        assert!((back - p).length() < 1e-5);
    }
}
