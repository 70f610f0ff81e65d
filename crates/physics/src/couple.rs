//! Collision couple tracking
//!
//! A couple records an observed contact between two bodies on one face so
//! the end-of-contact event fires exactly once when the contact
//! demonstrably ends. Couples hold generation-counted handles, never
//! references: a destroyed node shows up as a dead handle at the sweep.

use crate::node::NodeHandle;
use aabox::Face;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Couple {
    /// The body that registered the contact (its contact bit is tracked)
    pub a: NodeHandle,
    pub b: NodeHandle,
    /// Contact face on `a`
    pub face: Face,
    /// End-of-frame sweeps since the couple was last re-registered
    pub frames_waiting: u32,
}

/// Register a contact, refreshing the wait counter of an existing couple
pub(crate) fn register(couples: &mut Vec<Couple>, a: NodeHandle, b: NodeHandle, face: Face) {
    for couple in couples.iter_mut() {
        if couple.a == a && couple.b == b && couple.face == face {
            couple.frames_waiting = 0;
            return;
        }
    }
    tracing::trace!(?a, ?b, ?face, "collision couple begins");
    couples.push(Couple {
        a,
        b,
        face,
        frames_waiting: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_deduplicates_and_refreshes() {
        let mut couples = Vec::new();
        let a = NodeHandle::from_raw(0, 0);
        let b = NodeHandle::from_raw(1, 0);

        register(&mut couples, a, b, Face::NegY);
        couples[0].frames_waiting = 3;

        register(&mut couples, a, b, Face::NegY);
        assert_eq!(couples.len(), 1);
        assert_eq!(couples[0].frames_waiting, 0);

        // A different face is a distinct couple
        register(&mut couples, a, b, Face::PosX);
        assert_eq!(couples.len(), 2);
    }
}
