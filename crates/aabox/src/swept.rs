//! Continuous (swept) box-vs-box collision
//!
//! Tests a moving AABB against a static AABB over one displacement step and
//! reports the earliest time of impact as a fraction of the step, the
//! struck face, and an optional positional correction for boxes that
//! already overlap by less than one step.

use crate::{Aabb, Face};
use glam::Vec3;

/// Result of a swept box test
///
/// `ratio == 1.0` means no contact within the step. Otherwise `ratio` is
/// the fraction of the displacement traversable before contact and `face`
/// is the struck face of the static box (its outward direction opposes the
/// motion on the contact axis).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    pub ratio: f32,
    pub face: Option<Face>,
    /// One-shot positional correction resolving a pre-existing overlap on
    /// the contact axis. Zero unless the test ran with replacement and the
    /// boxes started overlapped.
    pub replacement: Vec3,
}

impl Sweep {
    /// A sweep that traversed the whole step without contact
    pub fn miss() -> Self {
        Self {
            ratio: 1.0,
            face: None,
            replacement: Vec3::ZERO,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.face.is_some()
    }
}

/// Swept collision test between a moving and a static AABB
///
/// Each axis is tested independently in fixed order X, Y, Z: for positive
/// motion the moving box's leading (max) face is tested against the static
/// box's near (min) face, symmetric for negative motion, and a zero
/// displacement component skips its axis. A candidate time-of-impact is
/// accepted only if at that instant the other two axes' extents still
/// overlap the static box shrunk by `eps`, which verifies true swept-box
/// overlap rather than a centerline crossing. The earliest accepted ratio
/// across axes wins.
///
/// A gap of exactly zero along the motion direction is not a contact until
/// the displacement would cross it, so resting boxes that merely touch
/// report a miss when `with_replacement` is off.
///
/// `with_replacement` widens the acceptance window on the tested axis by
/// one full step, so a box already overlapping by less than `dv` reports a
/// contact at ratio 0 together with the correction vector that moves it
/// back to the contact plane, instead of being treated as pre-collided.
///
/// `eps` is a per-axis slack absorbing floating-point boundary error.
pub fn sweep_box(
    moving: &Aabb,
    dv: Vec3,
    target: &Aabb,
    eps: Vec3,
    with_replacement: bool,
) -> Sweep {
    let mut best = Sweep::miss();
    let mut best_raw = 1.0f32;

    for axis in 0..3 {
        let d = dv[axis];
        if d == 0.0 {
            continue;
        }

        // Signed gap between the leading face of the moving box and the
        // facing side of the target, expressed as a time of impact in
        // step-fraction units.
        let (gap, face) = if d > 0.0 {
            (target.min[axis] - moving.max[axis], Face::from_axis(axis, false))
        } else {
            (target.max[axis] - moving.min[axis], Face::from_axis(axis, true))
        };
        let raw = gap / d;

        let lower = if with_replacement { -1.0 } else { 0.0 };
        if raw >= 1.0 || raw < lower {
            continue;
        }
        // An exact touch (raw == 0) only counts when replacement handling
        // is on; a plain query treats the un-crossed gap as a miss.
        if !with_replacement && raw <= 0.0 {
            continue;
        }
        if raw >= best_raw {
            continue;
        }

        // Verify the other two axes still overlap the target extent at the
        // instant of impact.
        let mut overlaps = true;
        for other in 0..3 {
            if other == axis {
                continue;
            }
            let lo = moving.min[other] + dv[other] * raw;
            let hi = moving.max[other] + dv[other] * raw;
            if lo >= target.max[other] - eps[other] || hi <= target.min[other] + eps[other] {
                overlaps = false;
                break;
            }
        }
        if !overlaps {
            continue;
        }

        best_raw = raw;
        best.ratio = raw.clamp(0.0, 1.0);
        best.face = Some(face);
        best.replacement = Vec3::ZERO;
        if raw < 0.0 {
            // Correction that moves the box back to the contact plane.
            let mut correction = Vec3::ZERO;
            correction[axis] = d * raw;
            best.replacement = correction;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn unit_at(min: Vec3) -> Aabb {
        Aabb::new(min, min + Vec3::ONE)
    }

    #[test]
    fn test_sweep_zero_displacement_is_miss() {
        let a = unit_at(Vec3::ZERO);
        let b = unit_at(Vec3::new(3.0, 0.0, 0.0));

        let sweep = sweep_box(&a, Vec3::ZERO, &b, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 1.0);
        assert!(!sweep.is_hit());
    }

    #[test]
    fn test_sweep_exact_touch_is_not_contact() {
        // Moving box rests exactly on top of the target; a gap of zero is
        // not a contact until the displacement would cross it.
        let moving = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let target = Aabb::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 0.0, 1.0));

        let sweep = sweep_box(&moving, Vec3::new(0.0, -0.5, 0.0), &target, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 1.0);
        assert!(sweep.face.is_none());
    }

    #[test]
    fn test_sweep_falling_onto_box() {
        let moving = unit_at(Vec3::new(0.0, 1.5, 0.0));
        let target = unit_at(Vec3::ZERO);

        let sweep = sweep_box(&moving, Vec3::new(0.0, -1.0, 0.0), &target, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 0.5);
        assert_eq!(sweep.face, Some(Face::PosY));
        assert_eq!(sweep.replacement, Vec3::ZERO);
    }

    #[test]
    fn test_sweep_positive_motion_hits_near_face() {
        let moving = unit_at(Vec3::new(-3.0, 0.0, 0.0));
        let target = unit_at(Vec3::ZERO);

        let sweep = sweep_box(&moving, Vec3::new(4.0, 0.0, 0.0), &target, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 0.5);
        assert_eq!(sweep.face, Some(Face::NegX));
    }

    #[test]
    fn test_sweep_misses_when_other_axes_never_overlap() {
        // Falls past the side of the target: Y crossing happens where X
        // extents are disjoint.
        let moving = unit_at(Vec3::new(2.5, 1.5, 0.0));
        let target = unit_at(Vec3::ZERO);

        let sweep = sweep_box(&moving, Vec3::new(0.0, -2.0, 0.0), &target, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 1.0);
        assert!(sweep.face.is_none());
    }

    #[test]
    fn test_sweep_epsilon_rejects_grazing_contact() {
        // Offset so only a 0.005 sliver of X extent overlaps at impact.
        let moving = unit_at(Vec3::new(0.995, 2.0, 0.0));
        let target = unit_at(Vec3::ZERO);
        let dv = Vec3::new(0.0, -1.5, 0.0);

        let hit = sweep_box(&moving, dv, &target, Vec3::ZERO, false);
        assert_eq!(hit.face, Some(Face::PosY));

        let miss = sweep_box(&moving, dv, &target, Vec3::splat(0.01), false);
        assert!(miss.face.is_none());
    }

    #[test]
    fn test_sweep_earliest_axis_wins() {
        // Diagonal approach toward a corner; X is reached first.
        let moving = unit_at(Vec3::new(-2.0, -0.25, 0.0));
        let target = unit_at(Vec3::ZERO);
        let dv = Vec3::new(2.0, 1.0, 0.0);

        let sweep = sweep_box(&moving, dv, &target, Vec3::ZERO, false);
        assert_eq!(sweep.face, Some(Face::NegX));
        assert_eq!(sweep.ratio, 0.5);
    }

    #[test]
    fn test_sweep_replacement_resolves_shallow_overlap() {
        // Already sunk 0.3 into the floor, still moving down.
        let moving = unit_at(Vec3::new(0.0, 0.7, 0.0));
        let target = unit_at(Vec3::ZERO);
        let dv = Vec3::new(0.0, -0.5, 0.0);

        let sweep = sweep_box(&moving, dv, &target, Vec3::ZERO, true);
        assert_eq!(sweep.ratio, 0.0);
        assert_eq!(sweep.face, Some(Face::PosY));
        assert!((sweep.replacement.y - 0.3).abs() < 1e-6);

        // The same configuration without replacement reports nothing.
        let plain = sweep_box(&moving, dv, &target, Vec3::ZERO, false);
        assert_eq!(plain.ratio, 1.0);
        assert!(plain.face.is_none());
    }

    #[test]
    fn test_sweep_replacement_window_is_one_step() {
        // Overlap deeper than one step is beyond the replacement window.
        let moving = unit_at(Vec3::new(0.0, 0.2, 0.0));
        let target = unit_at(Vec3::ZERO);
        let dv = Vec3::new(0.0, -0.5, 0.0);

        let sweep = sweep_box(&moving, dv, &target, Vec3::ZERO, true);
        assert!(sweep.face.is_none());
    }

    #[test]
    fn test_sweep_resting_touch_registers_with_replacement() {
        // Gravity keeps pushing a resting box down each frame; replacement
        // mode reports the contact at ratio zero with no correction.
        let moving = unit_at(Vec3::new(0.0, 1.0, 0.0));
        let target = unit_at(Vec3::ZERO);

        let sweep = sweep_box(&moving, Vec3::new(0.0, -0.2, 0.0), &target, Vec3::ZERO, true);
        assert_eq!(sweep.ratio, 0.0);
        assert_eq!(sweep.face, Some(Face::PosY));
        assert_eq!(sweep.replacement, Vec3::ZERO);
    }

    #[test]
    fn test_sweep_contact_at_full_step_is_miss() {
        // The displacement ends exactly flush with the target.
        let moving = unit_at(Vec3::new(0.0, 2.0, 0.0));
        let target = unit_at(Vec3::ZERO);

        let sweep = sweep_box(&moving, Vec3::new(0.0, -1.0, 0.0), &target, Vec3::ZERO, false);
        assert_eq!(sweep.ratio, 1.0);
        assert!(sweep.face.is_none());
    }
}
