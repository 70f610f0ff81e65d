use glam::Vec3;

/// One of the six principal axis-aligned directions
///
/// Faces are ordered -X, +X, -Y, +Y, -Z, +Z; the discriminant doubles as
/// the bit index inside [`ContactMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Face {
    NegX = 0,
    PosX = 1,
    NegY = 2,
    PosY = 3,
    NegZ = 4,
    PosZ = 5,
}

impl Face {
    /// Convert u8 index (0-5) to Face
    pub fn from_index(value: u8) -> Option<Self> {
        match value {
            0 => Some(Face::NegX),
            1 => Some(Face::PosX),
            2 => Some(Face::NegY),
            3 => Some(Face::PosY),
            4 => Some(Face::NegZ),
            5 => Some(Face::PosZ),
            _ => None,
        }
    }

    /// Face on the given axis (0=X, 1=Y, 2=Z) pointing in the given sign
    pub fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, false) => Face::NegX,
            (0, true) => Face::PosX,
            (1, false) => Face::NegY,
            (1, true) => Face::PosY,
            (2, false) => Face::NegZ,
            (2, true) => Face::PosZ,
            _ => panic!("axis must be 0, 1 or 2"),
        }
    }

    /// The axis this face is perpendicular to (0=X, 1=Y, 2=Z)
    pub fn axis(self) -> usize {
        (self as usize) / 2
    }

    /// Whether this face points in the positive direction of its axis
    pub fn is_positive(self) -> bool {
        (self as usize) % 2 == 1
    }

    /// Get opposite face
    pub fn opposite(self) -> Self {
        match self {
            Face::NegX => Face::PosX,
            Face::PosX => Face::NegX,
            Face::NegY => Face::PosY,
            Face::PosY => Face::NegY,
            Face::NegZ => Face::PosZ,
            Face::PosZ => Face::NegZ,
        }
    }

    /// Get the outward normal direction as a Vec3
    pub fn normal(self) -> Vec3 {
        match self {
            Face::NegX => Vec3::new(-1.0, 0.0, 0.0),
            Face::PosX => Vec3::new(1.0, 0.0, 0.0),
            Face::NegY => Vec3::new(0.0, -1.0, 0.0),
            Face::PosY => Vec3::new(0.0, 1.0, 0.0),
            Face::NegZ => Vec3::new(0.0, 0.0, -1.0),
            Face::PosZ => Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// All six faces in index order
    pub fn all() -> [Face; 6] {
        [
            Face::NegX,
            Face::PosX,
            Face::NegY,
            Face::PosY,
            Face::NegZ,
            Face::PosZ,
        ]
    }
}

/// Set of [`Face`] bits recording which principal directions currently have
/// a blocking contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactMask(u8);

impl ContactMask {
    pub const EMPTY: ContactMask = ContactMask(0);

    pub fn insert(&mut self, face: Face) {
        self.0 |= 1 << face as u8;
    }

    pub fn remove(&mut self, face: Face) {
        self.0 &= !(1 << face as u8);
    }

    pub fn contains(&self, face: Face) -> bool {
        self.0 & (1 << face as u8) != 0
    }

    /// Clear both faces of an axis (0=X, 1=Y, 2=Z)
    pub fn clear_axis(&mut self, axis: usize) {
        self.0 &= !(0b11 << (axis * 2));
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the faces currently set
    pub fn iter(&self) -> impl Iterator<Item = Face> + '_ {
        (0u8..6).filter_map(Face::from_index).filter(|f| self.contains(*f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_axis_and_sign() {
        assert_eq!(Face::NegX.axis(), 0);
        assert_eq!(Face::PosY.axis(), 1);
        assert_eq!(Face::PosZ.axis(), 2);
        assert!(Face::PosX.is_positive());
        assert!(!Face::NegZ.is_positive());
    }

    #[test]
    fn test_face_opposite_round_trip() {
        for face in Face::all() {
            assert_eq!(face.opposite().opposite(), face);
            assert_eq!(face.opposite().axis(), face.axis());
            assert_ne!(face.opposite().is_positive(), face.is_positive());
        }
    }

    #[test]
    fn test_face_normal_matches_sign() {
        for face in Face::all() {
            let n = face.normal();
            let component = n[face.axis()];
            assert_eq!(component, if face.is_positive() { 1.0 } else { -1.0 });
            assert_eq!(n.length_squared(), 1.0);
        }
    }

    #[test]
    fn test_contact_mask_insert_remove() {
        let mut mask = ContactMask::EMPTY;
        assert!(mask.is_empty());

        mask.insert(Face::NegY);
        mask.insert(Face::PosX);
        assert!(mask.contains(Face::NegY));
        assert!(mask.contains(Face::PosX));
        assert!(!mask.contains(Face::PosY));

        mask.remove(Face::NegY);
        assert!(!mask.contains(Face::NegY));
        assert!(!mask.is_empty());
    }

    #[test]
    fn test_contact_mask_clear_axis() {
        let mut mask = ContactMask::EMPTY;
        mask.insert(Face::NegX);
        mask.insert(Face::PosX);
        mask.insert(Face::NegY);

        mask.clear_axis(0);
        assert!(!mask.contains(Face::NegX));
        assert!(!mask.contains(Face::PosX));
        assert!(mask.contains(Face::NegY));
    }

    #[test]
    fn test_contact_mask_iter() {
        let mut mask = ContactMask::EMPTY;
        mask.insert(Face::PosZ);
        mask.insert(Face::NegX);

        let faces: Vec<Face> = mask.iter().collect();
        assert_eq!(faces, vec![Face::NegX, Face::PosZ]);
    }
}
