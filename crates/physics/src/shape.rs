//! Per-voxel collision queries for per-block body modes
//!
//! Bodies in the `*PerBlock` modes collide against voxel occupancy instead
//! of their single collider box. The solver consumes occupancy through the
//! [`VoxelShape`] trait: swept and overlap queries mirror the box
//! primitives but run against solid cells, and the ray query reports the
//! struck cell and face for block-precise casting.
//!
//! All queries are in shape-local space with unit cells at non-negative
//! integer coordinates.

use aabox::{sweep_box, Aabb, Face, Sweep};
use glam::{IVec3, Vec3};

/// A voxel-block hit from a shape ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelRayHit {
    /// Ray parameter of the hit, in units of the ray direction
    pub t: f32,
    /// Coordinates of the struck cell
    pub cell: IVec3,
    /// The struck cell face
    pub face: Face,
}

/// A swept result against voxel occupancy, tagged with the struck cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelSweep {
    pub sweep: Sweep,
    /// The cell of the earliest contact, when there is one
    pub cell: Option<IVec3>,
}

impl VoxelSweep {
    pub fn miss() -> Self {
        Self {
            sweep: Sweep::miss(),
            cell: None,
        }
    }
}

/// Voxel occupancy consumed by the solver for per-block collision
pub trait VoxelShape {
    /// Swept box test against all solid cells, earliest contact wins
    fn sweep_box(&self, moving: &Aabb, dv: Vec3, eps: Vec3, with_replacement: bool) -> VoxelSweep;

    /// Whether any solid cell overlaps `aabb` (loosened by `eps`)
    fn overlaps_box(&self, aabb: &Aabb, eps: f32) -> bool;

    /// First solid cell along a ray
    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Option<VoxelRayHit>;

    /// Local-space bounds enclosing all cells
    fn bounds(&self) -> Aabb;
}

/// Dense occupancy grid, the reference [`VoxelShape`]
///
/// Cells span `[0, dims)` per axis with unit size. Out-of-range cells are
/// empty.
pub struct VoxelGrid {
    dims: IVec3,
    cells: Vec<bool>,
}

impl VoxelGrid {
    pub fn new(dims: IVec3) -> Self {
        assert!(dims.x > 0 && dims.y > 0 && dims.z > 0, "grid dims must be positive");
        Self {
            dims,
            cells: vec![false; (dims.x * dims.y * dims.z) as usize],
        }
    }

    /// Build a grid from a per-cell predicate
    pub fn from_fn(dims: IVec3, mut solid: impl FnMut(IVec3) -> bool) -> Self {
        let mut grid = Self::new(dims);
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let cell = IVec3::new(x, y, z);
                    if solid(cell) {
                        grid.set(cell, true);
                    }
                }
            }
        }
        grid
    }

    fn cell_index(&self, cell: IVec3) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.z < 0 {
            return None;
        }
        if cell.x >= self.dims.x || cell.y >= self.dims.y || cell.z >= self.dims.z {
            return None;
        }
        Some(((cell.z * self.dims.y + cell.y) * self.dims.x + cell.x) as usize)
    }

    pub fn solid(&self, cell: IVec3) -> bool {
        self.cell_index(cell).map(|i| self.cells[i]).unwrap_or(false)
    }

    pub fn set(&mut self, cell: IVec3, solid: bool) {
        if let Some(i) = self.cell_index(cell) {
            self.cells[i] = solid;
        }
    }

    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    fn cell_aabb(cell: IVec3) -> Aabb {
        let min = cell.as_vec3();
        Aabb::new(min, min + Vec3::ONE)
    }

    /// Clamped integer cell range covered by a local-space box
    fn cell_range(&self, aabb: &Aabb, pad: f32) -> (IVec3, IVec3) {
        let lo = (aabb.min - Vec3::splat(pad))
            .floor()
            .as_ivec3()
            .max(IVec3::ZERO);
        let hi = (aabb.max + Vec3::splat(pad))
            .ceil()
            .as_ivec3()
            .min(self.dims);
        (lo, hi)
    }
}

impl VoxelShape for VoxelGrid {
    fn sweep_box(&self, moving: &Aabb, dv: Vec3, eps: Vec3, with_replacement: bool) -> VoxelSweep {
        let swept_volume = moving.expanded_by(dv);
        let (lo, hi) = self.cell_range(&swept_volume, 1.0);

        let mut best = VoxelSweep::miss();
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    let cell = IVec3::new(x, y, z);
                    if !self.solid(cell) {
                        continue;
                    }
                    let sweep =
                        sweep_box(moving, dv, &Self::cell_aabb(cell), eps, with_replacement);
                    if !sweep.is_hit() {
                        continue;
                    }
                    let earlier = sweep.ratio < best.sweep.ratio
                        || (sweep.ratio == best.sweep.ratio
                            && sweep.replacement.length_squared()
                                > best.sweep.replacement.length_squared());
                    if !best.sweep.is_hit() || earlier {
                        best = VoxelSweep {
                            sweep,
                            cell: Some(cell),
                        };
                    }
                }
            }
        }
        best
    }

    fn overlaps_box(&self, aabb: &Aabb, eps: f32) -> bool {
        let (lo, hi) = self.cell_range(aabb, eps.max(0.0) + 1.0);
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    let cell = IVec3::new(x, y, z);
                    if self.solid(cell) && aabb.intersects_eps(&Self::cell_aabb(cell), eps) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Option<VoxelRayHit> {
        let bounds = self.bounds();
        let t_enter = bounds.clip_ray(origin, dir)?;
        if t_enter > max_t {
            return None;
        }

        // Start just inside the boundary so the floor lands in the entry
        // cell rather than on its edge.
        let start = origin + dir * (t_enter + 1e-5);
        let mut cell = start.floor().as_ivec3();
        let mut t = t_enter;

        // Entry face from the dominant approach axis at the boundary.
        let entry_axis = {
            let mut axis = 0;
            let mut best = f32::MIN;
            for a in 0..3 {
                if dir[a] == 0.0 {
                    continue;
                }
                let boundary = if dir[a] > 0.0 { bounds.min[a] } else { bounds.max[a] };
                let ta = (boundary - origin[a]) / dir[a];
                if ta > best && ta <= t_enter + 1e-5 {
                    best = ta;
                    axis = a;
                }
            }
            axis
        };
        let mut face = Face::from_axis(entry_axis, dir[entry_axis] < 0.0);

        // Amanatides & Woo grid traversal
        let mut step = IVec3::ZERO;
        let mut t_max = Vec3::splat(f32::MAX);
        let mut t_delta = Vec3::splat(f32::MAX);
        for a in 0..3 {
            if dir[a] > 0.0 {
                step[a] = 1;
                t_max[a] = ((cell[a] + 1) as f32 - origin[a]) / dir[a];
                t_delta[a] = 1.0 / dir[a];
            } else if dir[a] < 0.0 {
                step[a] = -1;
                t_max[a] = (cell[a] as f32 - origin[a]) / dir[a];
                t_delta[a] = -1.0 / dir[a];
            }
        }

        loop {
            if cell.x < 0
                || cell.y < 0
                || cell.z < 0
                || cell.x >= self.dims.x
                || cell.y >= self.dims.y
                || cell.z >= self.dims.z
            {
                return None;
            }
            if t > max_t {
                return None;
            }
            if self.solid(cell) {
                return Some(VoxelRayHit { t, cell, face });
            }

            // Advance to the next cell across the nearest boundary
            let axis = if t_max.x <= t_max.y && t_max.x <= t_max.z {
                0
            } else if t_max.y <= t_max.z {
                1
            } else {
                2
            };
            t = t_max[axis];
            t_max[axis] += t_delta[axis];
            cell[axis] += step[axis];
            face = Face::from_axis(axis, step[axis] < 0);
        }
    }

    fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::ZERO, self.dims.as_vec3())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_grid() -> VoxelGrid {
        // 4x4x4 grid with a solid bottom layer
        VoxelGrid::from_fn(IVec3::splat(4), |c| c.y == 0)
    }

    #[test]
    fn test_grid_solid_out_of_range_is_empty() {
        let grid = floor_grid();
        assert!(grid.solid(IVec3::new(0, 0, 0)));
        assert!(!grid.solid(IVec3::new(0, 1, 0)));
        assert!(!grid.solid(IVec3::new(-1, 0, 0)));
        assert!(!grid.solid(IVec3::new(4, 0, 0)));
    }

    #[test]
    fn test_grid_sweep_lands_on_floor_layer() {
        let grid = floor_grid();
        // Unit box 0.5 above the floor layer, falling 1.0
        let moving = Aabb::new(Vec3::new(1.0, 1.5, 1.0), Vec3::new(2.0, 2.5, 2.0));

        let hit = grid.sweep_box(&moving, Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, true);
        assert_eq!(hit.sweep.ratio, 0.5);
        assert_eq!(hit.sweep.face, Some(Face::PosY));
        assert_eq!(hit.cell, Some(IVec3::new(1, 0, 1)));
    }

    #[test]
    fn test_grid_sweep_misses_over_empty_cells() {
        let grid = VoxelGrid::from_fn(IVec3::splat(4), |c| c.y == 0 && c.x < 2);
        // Falling over the empty half of the layer
        let moving = Aabb::new(Vec3::new(2.2, 1.5, 1.0), Vec3::new(3.2, 2.5, 2.0));

        let hit = grid.sweep_box(&moving, Vec3::new(0.0, -0.4, 0.0), Vec3::ZERO, true);
        assert!(!hit.sweep.is_hit());
        assert_eq!(hit.cell, None);
    }

    #[test]
    fn test_grid_overlap() {
        let grid = floor_grid();
        let inside = Aabb::new(Vec3::new(0.2, 0.2, 0.2), Vec3::new(0.8, 0.8, 0.8));
        let above = Aabb::new(Vec3::new(0.2, 1.2, 0.2), Vec3::new(0.8, 1.8, 0.8));

        assert!(grid.overlaps_box(&inside, 0.0));
        assert!(!grid.overlaps_box(&above, 0.0));
        // The outward epsilon catches the layer just below
        assert!(grid.overlaps_box(&above, 0.25));
    }

    #[test]
    fn test_grid_raycast_down_hits_floor_top() {
        let grid = floor_grid();
        let hit = grid
            .cast_ray(Vec3::new(1.5, 3.5, 1.5), Vec3::new(0.0, -1.0, 0.0), 10.0)
            .unwrap();

        assert_eq!(hit.cell, IVec3::new(1, 0, 1));
        assert_eq!(hit.face, Face::PosY);
        assert!((hit.t - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_grid_raycast_sideways_reports_entry_face() {
        let grid = VoxelGrid::from_fn(IVec3::splat(4), |c| c.x == 2);
        let hit = grid
            .cast_ray(Vec3::new(-1.0, 1.5, 1.5), Vec3::X, 10.0)
            .unwrap();

        assert_eq!(hit.cell, IVec3::new(2, 1, 1));
        assert_eq!(hit.face, Face::NegX);
        assert!((hit.t - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_grid_raycast_respects_max_t() {
        let grid = floor_grid();
        assert!(grid
            .cast_ray(Vec3::new(1.5, 3.5, 1.5), Vec3::new(0.0, -1.0, 0.0), 2.0)
            .is_none());
    }
}
