use glam::{Mat4, Vec3};

/// Axis-Aligned Bounding Box
///
/// Represents a box aligned to the world coordinate axes. All corners are
/// axis-aligned, making intersection tests simple min/max comparisons.
///
/// Invariant: `min <= max` componentwise. A box with `min == max` is
/// degenerate (empty) but valid; degenerate boxes are excluded from spatial
/// indexing by the callers, never rejected here.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a center point and half extents
    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// AABB for the unit cube [0,1]³
    pub fn unit() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        }
    }

    /// Calculate the center point of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculate the size (extents) of the AABB
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Calculate the half-size (half-extents) of the AABB
    pub fn half_size(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// A box with zero extent on any axis encloses no volume
    pub fn is_degenerate(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y || self.min.z >= self.max.z
    }

    /// Return this AABB translated by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Test intersection with another AABB
    ///
    /// Two AABBs intersect if they overlap in all three dimensions.
    /// Touching at a face or edge counts as intersecting. Symmetric:
    /// `a.intersects(&b) == b.intersects(&a)` for all boxes.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Intersection test with a uniform boundary slack
    ///
    /// A positive `eps` loosens the boundary (broadphase culling), a
    /// negative `eps` tightens it (exact contact confirmation).
    pub fn intersects_eps(&self, other: &Aabb, eps: f32) -> bool {
        self.min.x <= other.max.x + eps
            && self.max.x >= other.min.x - eps
            && self.min.y <= other.max.y + eps
            && self.max.y >= other.min.y - eps
            && self.min.z <= other.max.z + eps
            && self.max.z >= other.min.z - eps
    }

    /// Compute the overlapping region (returns None if no overlap)
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if min.x < max.x && min.y < max.y && min.z < max.z {
            Some(Aabb { min, max })
        } else {
            None
        }
    }

    /// Create an AABB that encompasses both AABBs
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Directionally expand the box by a displacement vector
    ///
    /// Negative components of `dv` extend `min`, positive components extend
    /// `max`. The result encloses the full volume swept by the box moving
    /// along `dv`, which is what the broadphase queries against.
    pub fn expanded_by(&self, dv: Vec3) -> Aabb {
        Aabb {
            min: self.min + dv.min(Vec3::ZERO),
            max: self.max + dv.max(Vec3::ZERO),
        }
    }

    /// Uniformly pad the box outward on all axes
    pub fn padded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Check if a point is inside the AABB (boundary inclusive)
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// The 8 corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Clip a ray against the box, returning the entry parameter
    ///
    /// Returns the smallest `t >= 0` with `origin + dir * t` on the box
    /// boundary, or `Some(0.0)` when the origin starts inside. `dir` does
    /// not need to be normalized; `t` is in units of `dir`.
    pub fn clip_ray(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let mut t_enter = 0.0f32;
        let mut t_exit = f32::MAX;

        for axis in 0..3 {
            let d = dir[axis];
            if d == 0.0 {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let t0 = (self.min[axis] - origin[axis]) * inv;
            let t1 = (self.max[axis] - origin[axis]) * inv;
            let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            t_enter = t_enter.max(near);
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        Some(t_enter)
    }

    /// Transform the box through an arbitrary matrix and re-wrap it
    ///
    /// Pushes all 8 corners through `m` and takes the componentwise
    /// min/max. The result is a tight axis-aligned wrap of the transformed
    /// (possibly rotated) box and may be larger than the original. This is
    /// how rotated colliders produce world-space AABBs for indexing and
    /// broadphase.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let mut out_min = Vec3::splat(f32::MAX);
        let mut out_max = Vec3::splat(f32::MIN);

        for corner in self.corners() {
            let p = m.transform_point3(corner);
            out_min = out_min.min(p);
            out_max = out_max.max(p);
        }

        Aabb {
            min: out_min,
            max: out_max,
        }
    }

    /// Transform the box into another body's local frame
    ///
    /// Composes `m` (this box's transform, typically a world matrix) with
    /// `into_inverse` (the inverse world matrix of the other body), so a
    /// moving world box can be swept against a rotated static collider in
    /// that collider's own axis-aligned space.
    pub fn transformed_into(&self, m: &Mat4, into_inverse: &Mat4) -> Aabb {
        self.transformed(&(*into_inverse * *m))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::unit()
    }
}
