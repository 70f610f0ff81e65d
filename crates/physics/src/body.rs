//! Per-body physics state and the tick state machine surface
//!
//! A [`RigidBody`] holds everything the solver knows about one entity:
//! collider box, motion state, material coefficients, group masks, contact
//! bits and the sleep countdown. The per-tick simulation itself lives in
//! the solver module; this type is the state it reads and writes.

use crate::node::NodeHandle;
use crate::spatial::LeafHandle;
use aabox::{Aabb, ContactMask};
use glam::Vec3;

/// Ticks a freshly disturbed body stays awake before it may sleep again
pub(crate) const DEFAULT_AWAKE_FRAMES: u32 = 10;

/// Simulation mode of a body
///
/// `*PerBlock` modes collide against voxel occupancy (through the attached
/// shape) instead of the single collider box. Non-dynamic bodies are never
/// displaced; the solver re-expresses moving boxes in their local space
/// rather than rotating itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// No simulation, not indexed
    #[default]
    Disabled,
    /// Contributes to collisions, never integrated
    Static,
    /// Static, but collision runs against voxel occupancy
    StaticPerBlock,
    /// Integrated and solved every tick
    Dynamic,
    /// Overlap detection only, imparts no physical response
    Trigger,
    /// Trigger semantics over voxel occupancy
    TriggerPerBlock,
}

impl BodyMode {
    pub fn is_per_block(self) -> bool {
        matches!(self, BodyMode::StaticPerBlock | BodyMode::TriggerPerBlock)
    }

    pub fn is_trigger(self) -> bool {
        matches!(self, BodyMode::Trigger | BodyMode::TriggerPerBlock)
    }
}

/// What a body's tick did this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The body ended the tick at a different position
    Moved,
    /// The solver ran but the body did not move beyond epsilon
    Stayed,
    /// The body was (or fell) asleep; no solver work was done
    Slept,
    /// Nothing to simulate: disabled, static, or inactive trigger
    Skipped,
}

/// Physics state attached to a scene node
pub struct RigidBody {
    pub(crate) collider: Aabb,
    pub(crate) leaf: Option<LeafHandle>,
    pub(crate) motion: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) acceleration: Vec3,
    mass: f32,
    pub(crate) friction: f32,
    pub(crate) bounciness: f32,
    pub(crate) contacts: ContactMask,
    pub(crate) groups: u32,
    pub(crate) collides_with: u32,
    mode: BodyMode,
    pub(crate) events_enabled: bool,
    pub(crate) end_events_enabled: bool,
    pub(crate) awake_countdown: u32,
    /// Current per-face overlap owners, trigger modes only
    pub(crate) trigger_owners: [Option<NodeHandle>; 6],
}

impl RigidBody {
    pub fn new(mode: BodyMode, collider: Aabb) -> Self {
        Self {
            collider,
            leaf: None,
            motion: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            mass: 1.0,
            friction: 0.0,
            bounciness: 0.0,
            contacts: ContactMask::EMPTY,
            groups: 1,
            collides_with: 1,
            mode,
            events_enabled: false,
            end_events_enabled: false,
            awake_countdown: DEFAULT_AWAKE_FRAMES,
            trigger_owners: [None; 6],
        }
    }

    pub fn mode(&self) -> BodyMode {
        self.mode
    }

    /// Change the simulation mode
    ///
    /// Leaving `Dynamic`, or entering `Disabled`, clears velocity, motion
    /// and contact state. Mass, friction, bounciness and group masks
    /// persist across mode changes.
    pub fn set_mode(&mut self, mode: BodyMode) {
        if mode == self.mode {
            return;
        }
        if self.mode == BodyMode::Dynamic || mode == BodyMode::Disabled {
            self.velocity = Vec3::ZERO;
            self.motion = Vec3::ZERO;
            self.contacts.clear();
            self.trigger_owners = [None; 6];
        }
        self.mode = mode;
    }

    pub fn collider(&self) -> Aabb {
        self.collider
    }

    pub fn set_collider(&mut self, collider: Aabb) {
        self.collider = collider;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set the body mass, clamped to at least 1
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(1.0);
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn bounciness(&self) -> f32 {
        self.bounciness
    }

    pub fn set_bounciness(&mut self, bounciness: f32) {
        self.bounciness = bounciness;
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Set the velocity and keep the body awake
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.wake(DEFAULT_AWAKE_FRAMES);
    }

    pub fn motion(&self) -> Vec3 {
        self.motion
    }

    /// Scripted per-tick offset, exempt from drag and gravity
    pub fn set_motion(&mut self, motion: Vec3) {
        self.motion = motion;
        self.wake(DEFAULT_AWAKE_FRAMES);
    }

    pub fn acceleration(&self) -> Vec3 {
        self.acceleration
    }

    pub fn set_acceleration(&mut self, acceleration: Vec3) {
        self.acceleration = acceleration;
    }

    pub fn contacts(&self) -> ContactMask {
        self.contacts
    }

    pub fn groups(&self) -> u32 {
        self.groups
    }

    pub fn collides_with(&self) -> u32 {
        self.collides_with
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    pub fn set_events_enabled(&mut self, enabled: bool) {
        self.events_enabled = enabled;
    }

    pub fn end_events_enabled(&self) -> bool {
        self.end_events_enabled
    }

    pub fn set_end_events_enabled(&mut self, enabled: bool) {
        self.end_events_enabled = enabled;
    }

    /// Keep the body simulating for at least `frames` more ticks
    pub fn wake(&mut self, frames: u32) {
        self.awake_countdown = self.awake_countdown.max(frames);
    }

    pub fn is_awake(&self) -> bool {
        self.awake_countdown > 0
    }

    /// Whether the body belongs in the spatial index
    ///
    /// Disabled bodies, degenerate world colliders and empty group masks
    /// all make a body ineligible. This is a normal state, never an error.
    pub(crate) fn is_indexable(&self, world_collider: &Aabb) -> bool {
        self.mode != BodyMode::Disabled
            && !world_collider.is_degenerate()
            && (self.groups | self.collides_with) != 0
    }

    /// Trigger-mode body with its events switched on
    pub(crate) fn is_active_trigger(&self) -> bool {
        self.mode.is_trigger() && self.events_enabled
    }

    pub(crate) fn is_dynamic_or_active_trigger(&self) -> bool {
        self.mode == BodyMode::Dynamic || self.is_active_trigger()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_body(mode: BodyMode) -> RigidBody {
        RigidBody::new(mode, Aabb::new(Vec3::ZERO, Vec3::ONE))
    }

    #[test]
    fn test_mass_clamped_to_one() {
        let mut body = unit_body(BodyMode::Dynamic);
        body.set_mass(0.25);
        assert_eq!(body.mass(), 1.0);
        body.set_mass(5.0);
        assert_eq!(body.mass(), 5.0);
    }

    #[test]
    fn test_leaving_dynamic_clears_motion_state() {
        let mut body = unit_body(BodyMode::Dynamic);
        body.set_velocity(Vec3::X);
        body.set_motion(Vec3::Y);
        body.contacts.insert(aabox::Face::NegY);
        body.set_friction(0.7);

        body.set_mode(BodyMode::Static);
        assert_eq!(body.velocity(), Vec3::ZERO);
        assert_eq!(body.motion(), Vec3::ZERO);
        assert!(body.contacts().is_empty());
        // Material properties persist
        assert_eq!(body.friction(), 0.7);
    }

    #[test]
    fn test_static_to_trigger_keeps_state() {
        let mut body = unit_body(BodyMode::Static);
        body.contacts.insert(aabox::Face::PosX);
        body.set_mode(BodyMode::Trigger);
        // Only the dynamic exit and the disabled entry clear state
        assert!(body.contacts().contains(aabox::Face::PosX));
    }

    #[test]
    fn test_indexing_eligibility() {
        let mut body = unit_body(BodyMode::Static);
        let world = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(body.is_indexable(&world));

        let degenerate = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
        assert!(!body.is_indexable(&degenerate));

        body.groups = 0;
        body.collides_with = 0;
        assert!(!body.is_indexable(&world));

        body.collides_with = 2;
        assert!(body.is_indexable(&world));

        body.set_mode(BodyMode::Disabled);
        assert!(!body.is_indexable(&world));
    }

    #[test]
    fn test_active_trigger_requires_events() {
        let mut body = unit_body(BodyMode::Trigger);
        assert!(!body.is_active_trigger());
        body.set_events_enabled(true);
        assert!(body.is_active_trigger());

        let mut stat = unit_body(BodyMode::Static);
        stat.set_events_enabled(true);
        assert!(!stat.is_active_trigger());
    }
}
