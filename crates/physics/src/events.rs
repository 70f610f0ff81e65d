//! Collision event sink
//!
//! Contact begin/end notifications are delivered through a sink injected
//! into the scene at construction. There is no process-wide registration:
//! whoever builds the scene decides where events go.

use crate::node::NodeHandle;
use aabox::Face;
use glam::Vec3;

/// A contact registered by the solver or the trigger overlap pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    /// The body this event is delivered for
    pub body: NodeHandle,
    /// The body it touched
    pub other: NodeHandle,
    /// Contact direction on `body` (the face of `body` that is blocked)
    pub face: Face,
    /// World-space contact normal, pointing from `other` toward `body`
    pub normal: Vec3,
    /// World-space position of `body` at the moment of contact
    pub position: Vec3,
}

/// Receiver for collision begin and end-of-contact notifications
pub trait CollisionEvents {
    /// A contact began or re-registered this frame
    fn on_contact(&mut self, event: &ContactEvent);

    /// A tracked contact between `a` and `b` on `face` demonstrably ended
    fn on_contact_end(&mut self, a: NodeHandle, b: NodeHandle, face: Face);
}

/// Sink that discards all events
#[derive(Debug, Default)]
pub struct NullEvents;

impl CollisionEvents for NullEvents {
    fn on_contact(&mut self, _event: &ContactEvent) {}
    fn on_contact_end(&mut self, _a: NodeHandle, _b: NodeHandle, _face: Face) {}
}
